//! Host stat sampler.
//!
//! Polls CPU, memory and network counters on a fixed interval and writes them
//! into `ServiceMetrics`. Every read is best-effort: a failing source skips
//! that one metric for the tick and the loop carries on. The loop ends when
//! its `CancellationToken` fires.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sysinfo::{Networks, System};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use smsgate_core::error::{Result, SmsGateError};

use crate::config::NetworkAccounting;
use crate::obs::ServiceMetrics;

/// Cumulative bytes of one interface, as reported by the OS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetTotals {
    pub sent: u64,
    pub received: u64,
}

/// Source of host statistics. Errors are `SmsGateError::SamplerRead`.
pub trait StatSource: Send {
    /// Global CPU utilization in percent.
    fn cpu_percent(&mut self) -> Result<f64>;
    /// Used memory in percent of total.
    fn memory_percent(&mut self) -> Result<f64>;
    /// Cumulative bytes sent/received since boot, keyed by interface name.
    fn network_totals(&mut self) -> Result<HashMap<String, NetTotals>>;
}

/// `StatSource` backed by `sysinfo`.
pub struct SysinfoSource {
    sys: System,
    networks: Networks,
}

impl SysinfoSource {
    pub fn new() -> Self {
        let mut sys = System::new();
        // CPU usage is computed between two refreshes; prime the first one.
        sys.refresh_cpu_usage();
        Self {
            sys,
            networks: Networks::new_with_refreshed_list(),
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StatSource for SysinfoSource {
    fn cpu_percent(&mut self) -> Result<f64> {
        self.sys.refresh_cpu_usage();
        if self.sys.cpus().is_empty() {
            return Err(SmsGateError::SamplerRead("no cpus reported".into()));
        }
        let pct = f64::from(self.sys.global_cpu_usage());
        if !pct.is_finite() {
            return Err(SmsGateError::SamplerRead(format!("cpu usage not finite: {pct}")));
        }
        Ok(pct.clamp(0.0, 100.0))
    }

    fn memory_percent(&mut self) -> Result<f64> {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            return Err(SmsGateError::SamplerRead("total memory reported as 0".into()));
        }
        let used = self.sys.used_memory().min(total);
        Ok(used as f64 / total as f64 * 100.0)
    }

    fn network_totals(&mut self) -> Result<HashMap<String, NetTotals>> {
        self.networks.refresh(true);
        let list = self.networks.list();
        if list.is_empty() {
            return Err(SmsGateError::SamplerRead("no network interfaces".into()));
        }
        Ok(list
            .iter()
            .map(|(name, data)| {
                let totals = NetTotals {
                    sent: data.total_transmitted(),
                    received: data.total_received(),
                };
                (name.clone(), totals)
            })
            .collect())
    }
}

/// Bytes added by one reading of the same interface. A counter that went
/// backwards (interface reset) contributes its full current value.
fn delta(prev: u64, now: u64) -> u64 {
    if now >= prev {
        now - prev
    } else {
        now
    }
}

pub struct Sampler<S> {
    source: S,
    metrics: Arc<ServiceMetrics>,
    accounting: NetworkAccounting,
    /// Previous reading per interface. Interfaces missing from the latest
    /// reading are forgotten.
    last_net: HashMap<String, NetTotals>,
}

impl<S: StatSource> Sampler<S> {
    pub fn new(source: S, metrics: Arc<ServiceMetrics>, accounting: NetworkAccounting) -> Self {
        Self {
            source,
            metrics,
            accounting,
            last_net: HashMap::new(),
        }
    }

    /// Take one sample of every source.
    pub fn tick(&mut self) {
        match self.source.cpu_percent() {
            Ok(pct) => self.metrics.cpu_usage.set(&[], pct),
            Err(e) => tracing::debug!(error = %e, "cpu sample skipped"),
        }

        match self.source.memory_percent() {
            Ok(pct) => self.metrics.memory_usage.set(&[], pct),
            Err(e) => tracing::debug!(error = %e, "memory sample skipped"),
        }

        match self.source.network_totals() {
            Ok(now) => {
                let inc = self.network_increment(now);
                self.metrics.network_traffic.add(&["sent"], inc.sent);
                self.metrics.network_traffic.add(&["received"], inc.received);
            }
            Err(e) => tracing::debug!(error = %e, "network sample skipped"),
        }
    }

    fn network_increment(&mut self, now: HashMap<String, NetTotals>) -> NetTotals {
        let mut inc = NetTotals::default();
        match self.accounting {
            NetworkAccounting::Cumulative => {
                for t in now.values() {
                    inc.sent = inc.sent.saturating_add(t.sent);
                    inc.received = inc.received.saturating_add(t.received);
                }
            }
            NetworkAccounting::Delta => {
                for (name, t) in &now {
                    // First sighting of an interface is its baseline.
                    let Some(prev) = self.last_net.get(name) else { continue };
                    inc.sent = inc.sent.saturating_add(delta(prev.sent, t.sent));
                    inc.received = inc.received.saturating_add(delta(prev.received, t.received));
                }
                self.last_net = now;
            }
        }
        inc
    }

    /// Sample every `interval` until `cancel` fires. The first sample is taken
    /// immediately.
    pub async fn run(mut self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("sampler cancelled");
                    break;
                }
                _ = ticker.tick() => self.tick(),
            }
        }
    }
}

impl<S: StatSource + 'static> Sampler<S> {
    pub fn spawn(self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tracing::info!(interval_ms = interval.as_millis() as u64, accounting = ?self.accounting, "sampler starting");
        tokio::spawn(self.run(interval, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays scripted readings; `None` entries are read failures.
    #[derive(Default)]
    struct ScriptedSource {
        cpu: VecDeque<Option<f64>>,
        mem: VecDeque<Option<f64>>,
        net: VecDeque<Option<HashMap<String, NetTotals>>>,
    }

    fn pop<T>(q: &mut VecDeque<Option<T>>) -> Result<T> {
        q.pop_front()
            .flatten()
            .ok_or_else(|| SmsGateError::SamplerRead("scripted failure".into()))
    }

    impl StatSource for ScriptedSource {
        fn cpu_percent(&mut self) -> Result<f64> {
            pop(&mut self.cpu)
        }
        fn memory_percent(&mut self) -> Result<f64> {
            pop(&mut self.mem)
        }
        fn network_totals(&mut self) -> Result<HashMap<String, NetTotals>> {
            pop(&mut self.net)
        }
    }

    /// Single-interface reading.
    fn net(sent: u64, received: u64) -> Option<HashMap<String, NetTotals>> {
        ifaces(&[("eth0", sent, received)])
    }

    fn ifaces(readings: &[(&str, u64, u64)]) -> Option<HashMap<String, NetTotals>> {
        Some(
            readings
                .iter()
                .map(|&(name, sent, received)| (name.to_string(), NetTotals { sent, received }))
                .collect(),
        )
    }

    fn metrics() -> Arc<ServiceMetrics> {
        Arc::new(ServiceMetrics::new().unwrap())
    }

    #[test]
    fn failed_read_skips_only_that_metric() {
        let m = metrics();
        let source = ScriptedSource {
            cpu: VecDeque::from([None]),
            mem: VecDeque::from([Some(42.0)]),
            net: VecDeque::from([None]),
        };
        let mut sampler = Sampler::new(source, Arc::clone(&m), NetworkAccounting::Delta);
        sampler.tick();

        assert_eq!(m.cpu_usage.get(&[]), None);
        assert_eq!(m.memory_usage.get(&[]), Some(42.0));
        assert_eq!(m.network_traffic.get(&["sent"]), 0);
    }

    #[test]
    fn delta_accounting_adds_only_new_bytes() {
        let m = metrics();
        let source = ScriptedSource {
            net: VecDeque::from([net(1_000, 5_000), net(1_500, 5_100), None, net(2_000, 5_100)]),
            ..Default::default()
        };
        let mut sampler = Sampler::new(source, Arc::clone(&m), NetworkAccounting::Delta);

        sampler.tick();
        assert_eq!(m.network_traffic.get(&["sent"]), 0);
        assert_eq!(m.network_traffic.get(&["received"]), 0);

        sampler.tick();
        assert_eq!(m.network_traffic.get(&["sent"]), 500);
        assert_eq!(m.network_traffic.get(&["received"]), 100);

        // Failed read keeps the baseline; the next reading covers the gap.
        sampler.tick();
        sampler.tick();
        assert_eq!(m.network_traffic.get(&["sent"]), 1_000);
        assert_eq!(m.network_traffic.get(&["received"]), 100);
    }

    #[test]
    fn delta_accounting_survives_counter_reset() {
        let m = metrics();
        let source = ScriptedSource {
            net: VecDeque::from([net(10_000, 10_000), net(300, 700)]),
            ..Default::default()
        };
        let mut sampler = Sampler::new(source, Arc::clone(&m), NetworkAccounting::Delta);
        sampler.tick();
        sampler.tick();
        assert_eq!(m.network_traffic.get(&["sent"]), 300);
        assert_eq!(m.network_traffic.get(&["received"]), 700);
    }

    #[test]
    fn removed_interface_does_not_count_as_reset() {
        let m = metrics();
        let source = ScriptedSource {
            net: VecDeque::from([
                ifaces(&[("eth0", 9_000, 9_000), ("veth1", 1_000, 1_000)]),
                ifaces(&[("eth0", 9_010, 9_000)]),
            ]),
            ..Default::default()
        };
        let mut sampler = Sampler::new(source, Arc::clone(&m), NetworkAccounting::Delta);
        sampler.tick();
        sampler.tick();
        assert_eq!(m.network_traffic.get(&["sent"]), 10);
        assert_eq!(m.network_traffic.get(&["received"]), 0);
    }

    #[test]
    fn new_interface_starts_at_baseline() {
        let m = metrics();
        let source = ScriptedSource {
            net: VecDeque::from([
                ifaces(&[("eth0", 100, 100)]),
                ifaces(&[("eth0", 150, 120), ("veth2", 50_000, 70_000)]),
                ifaces(&[("eth0", 150, 120), ("veth2", 50_300, 70_400)]),
            ]),
            ..Default::default()
        };
        let mut sampler = Sampler::new(source, Arc::clone(&m), NetworkAccounting::Delta);
        sampler.tick();
        sampler.tick();
        assert_eq!(m.network_traffic.get(&["sent"]), 50);
        assert_eq!(m.network_traffic.get(&["received"]), 20);

        sampler.tick();
        assert_eq!(m.network_traffic.get(&["sent"]), 350);
        assert_eq!(m.network_traffic.get(&["received"]), 420);
    }

    #[test]
    fn reappearing_interface_is_a_fresh_baseline() {
        let m = metrics();
        let source = ScriptedSource {
            net: VecDeque::from([
                ifaces(&[("eth0", 0, 0), ("veth1", 500, 500)]),
                ifaces(&[("eth0", 0, 0)]),
                ifaces(&[("eth0", 0, 0), ("veth1", 800, 900)]),
            ]),
            ..Default::default()
        };
        let mut sampler = Sampler::new(source, Arc::clone(&m), NetworkAccounting::Delta);
        sampler.tick();
        sampler.tick();
        sampler.tick();
        assert_eq!(m.network_traffic.get(&["sent"]), 0);
        assert_eq!(m.network_traffic.get(&["received"]), 0);
    }

    #[test]
    fn cumulative_accounting_readds_totals() {
        let m = metrics();
        let source = ScriptedSource {
            net: VecDeque::from([net(100, 200), net(100, 200)]),
            ..Default::default()
        };
        let mut sampler = Sampler::new(source, Arc::clone(&m), NetworkAccounting::Cumulative);
        sampler.tick();
        sampler.tick();
        assert_eq!(m.network_traffic.get(&["sent"]), 200);
        assert_eq!(m.network_traffic.get(&["received"]), 400);
    }

    #[test]
    fn sysinfo_tick_exports_percentages() {
        let m = metrics();
        let mut sampler = Sampler::new(SysinfoSource::new(), Arc::clone(&m), NetworkAccounting::Delta);
        sampler.tick();

        let out = m.render();
        for name in ["cpu_usage", "memory_usage"] {
            let line = out
                .lines()
                .find(|l| l.starts_with(&format!("{name} ")))
                .unwrap_or_else(|| panic!("{name} missing from:\n{out}"));
            let v: f64 = line.split_whitespace().nth(1).unwrap().parse().unwrap();
            assert!((0.0..=100.0).contains(&v), "{name}={v}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_until_cancelled() {
        let m = metrics();
        let source = ScriptedSource {
            mem: (0..100).map(|i| Some(i as f64)).collect(),
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let handle = Sampler::new(source, Arc::clone(&m), NetworkAccounting::Delta)
            .spawn(Duration::from_secs(5), cancel.clone());

        // Immediate tick plus two interval ticks.
        tokio::time::sleep(Duration::from_millis(10_100)).await;
        assert_eq!(m.memory_usage.get(&[]), Some(2.0));

        cancel.cancel();
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(m.memory_usage.get(&[]), Some(2.0));
    }
}
