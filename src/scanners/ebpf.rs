//! eBPF exec/connect tracer (spec §4.W).
//!
//! Gated behind the `ebpf` cargo feature. Loads a pre-built skeleton
//! exposing a ring buffer of exec and connect events and polls it for
//! `ioc_exec_trace_seconds`. Any stage failure is recorded as a structured
//! error and the scan returns without aborting other scanners.

use crate::context::ScanContext;
use crate::registry::Scanner;

const NAME: &str = "ebpf";

pub struct EbpfScanner;

impl Scanner for EbpfScanner {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Traces sched_process_exec and connect syscalls via a ring-buffer eBPF program (requires the ebpf feature)"
    }

    #[cfg(not(feature = "ebpf"))]
    fn scan(&self, ctx: &ScanContext<'_>) {
        ctx.report.add_warning(NAME, crate::finding::DiagnosticCode::Unknown, "ebpf feature not enabled; scanner skipped");
    }

    #[cfg(feature = "ebpf")]
    fn scan(&self, ctx: &ScanContext<'_>) {
        if !ctx.config.ioc_exec_trace {
            return;
        }

        let seconds = if ctx.config.ioc_exec_trace_seconds > 0 { ctx.config.ioc_exec_trace_seconds as u64 } else { 3 };

        match imp::run_trace(ctx, seconds) {
            Ok(()) => {}
            Err(e) => {
                ctx.report.add_error(NAME, crate::finding::DiagnosticCode::Unknown, format!("ebpf tracer failed: {e}"));
            }
        }
    }
}

#[cfg(feature = "ebpf")]
mod imp {
    use std::time::{Duration, Instant};

    use aya::maps::RingBuf;
    use aya::programs::{RawTracePoint, TracePoint};
    use aya::Ebpf;

    use crate::context::ScanContext;
    use crate::finding::Finding;
    use crate::severity::Severity;

    use super::NAME;

    /// Loads the skeleton, attaches exec/connect probes, and polls the ring
    /// buffer for up to `seconds` wall-clock seconds (spec §4.W; no
    /// cooperative cancellation, a hard deadline only).
    pub(super) fn run_trace(ctx: &ScanContext<'_>, seconds: u64) -> anyhow::Result<()> {
        let mut ebpf = Ebpf::load(aya::include_bytes_aligned!(concat!(env!("OUT_DIR"), "/hostaudit-trace.bpf.o")))?;

        let exec_prog: &mut TracePoint = ebpf.program_mut("trace_exec").ok_or_else(|| anyhow::anyhow!("trace_exec program missing"))?.try_into()?;
        exec_prog.load()?;
        exec_prog.attach("sched", "sched_process_exec")?;

        let connect_prog: &mut RawTracePoint =
            ebpf.program_mut("trace_connect").ok_or_else(|| anyhow::anyhow!("trace_connect program missing"))?.try_into()?;
        connect_prog.load()?;
        connect_prog.attach("sys_enter_connect")?;

        let ring = ebpf.take_map("EVENTS").ok_or_else(|| anyhow::anyhow!("ring buffer map missing"))?;
        let mut ring_buf = RingBuf::try_from(ring)?;

        let deadline = Instant::now() + Duration::from_secs(seconds);
        while Instant::now() < deadline {
            if let Some(item) = ring_buf.next() {
                emit_event(ctx, &item);
            } else {
                std::thread::sleep(Duration::from_millis(200));
            }
        }

        Ok(())
    }

    fn emit_event(ctx: &ScanContext<'_>, raw: &[u8]) {
        // Event layout: tag(u8) pid(u32) comm(16) [exec] | daddr/dport/is_ipv6/daddr6 [connect].
        let Some(&tag) = raw.first() else { return };
        match tag {
            0 => {
                if raw.len() < 21 {
                    return;
                }
                let pid = u32::from_ne_bytes(raw[1..5].try_into().unwrap());
                let comm = cstr_from_bytes(&raw[5..21]);
                ctx.report.add_finding(
                    NAME,
                    Finding::new("exec.trace", "Traced exec", Severity::Info, format!("pid={pid} comm={comm}"))
                        .meta("pid", pid.to_string())
                        .meta("comm", comm)
                        .meta("source", "ebpf")
                        .meta("collector", "exec"),
                );
            }
            1 => {
                if raw.len() < 43 {
                    return;
                }
                let pid = u32::from_ne_bytes(raw[1..5].try_into().unwrap());
                let comm = cstr_from_bytes(&raw[5..21]);
                let is_ipv6 = raw[21] != 0;
                let dport = u16::from_ne_bytes(raw[22..24].try_into().unwrap());
                let dst_ip = if is_ipv6 {
                    format_ipv6(&raw[24..40])
                } else {
                    let octets: [u8; 4] = raw[24..28].try_into().unwrap();
                    format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
                };

                ctx.report.add_finding(
                    NAME,
                    Finding::new("net.connect", "Traced connect", Severity::Info, format!("pid={pid} comm={comm} dst={dst_ip}:{dport}"))
                        .meta("pid", pid.to_string())
                        .meta("comm", comm)
                        .meta("dst_ip", dst_ip)
                        .meta("dst_port", dport.to_string())
                        .meta("source", "ebpf")
                        .meta("collector", "tcp_v4_connect"),
                );
            }
            _ => {}
        }
    }

    fn cstr_from_bytes(bytes: &[u8]) -> String {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..end]).into_owned()
    }

    fn format_ipv6(bytes: &[u8]) -> String {
        bytes.chunks(2).map(|c| format!("{:02x}{:02x}", c[0], c[1])).collect::<Vec<_>>().join(":")
    }
}
