//! Rendering of a finished run.

use std::fmt::Write;

use crate::bench::aggregate::BenchReport;
use crate::config::OutputFormat;
use crate::utils::BenchError;

/// Render `report` in the requested format. JSON writes undefined values
/// (`NaN`, infinities) as `null`.
pub fn render(report: &BenchReport, format: OutputFormat) -> Result<String, BenchError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Text => Ok(render_text(report)),
    }
}

fn render_text(report: &BenchReport) -> String {
    let mut out = String::new();
    // writing to a String cannot fail
    let _ = write_text(&mut out, report);
    out
}

fn write_text(out: &mut String, report: &BenchReport) -> std::fmt::Result {
    for run in &report.runs {
        writeln!(out, "======= PUBLISHER {} =======", run.id)?;
        writeln!(
            out,
            "Ratio:               {:.3} ({}/{})",
            run.ratio(),
            run.successes,
            run.successes + run.failures
        )?;
        writeln!(out, "Bandwidth (msg/sec): {:.3}", run.msgs_per_sec)?;
        writeln!(out, "CPU Usage (percent): {:.2}", run.cpu_usage)?;
        writeln!(out, "RAM Usage (percent): {:.2}", run.memory_usage)?;
        writeln!(out)?;
    }

    let t = &report.totals;
    writeln!(out, "========= TOTAL ({}) =========", report.runs.len())?;
    writeln!(
        out,
        "Total Ratio:                 {:.3} ({}/{})",
        t.ratio,
        t.successes,
        t.successes + t.failures
    )?;
    writeln!(out, "Total Runtime (sec):         {:.3}", t.total_run_time)?;
    writeln!(out, "Latency samples:             {}", t.time_measurements.len())?;
    writeln!(out, "Msg time min (ms):           {:.3}", t.msg_time_min)?;
    writeln!(out, "Msg time max (ms):           {:.3}", t.msg_time_max)?;
    writeln!(out, "Msg time mean (ms):          {:.3}", t.msg_time_mean)?;
    writeln!(out, "Msg time std (ms):           {:.3}", t.msg_time_std)?;
    writeln!(
        out,
        "Average Bandwidth Per Publisher (msg/sec):  {:.3}",
        t.avg_msgs_per_sec_publisher
    )?;
    writeln!(
        out,
        "Total Bandwidth Publishers (msg/sec):       {:.3}",
        t.total_msgs_per_sec_publisher
    )?;
    writeln!(
        out,
        "Average Bandwidth Per Subscriber (msg/sec): {:.3}",
        t.avg_msgs_per_sec_subscriber
    )?;
    writeln!(
        out,
        "Total Bandwidth Subscribers (msg/sec):      {:.3}",
        t.total_msgs_per_sec_subscriber
    )?;
    writeln!(out, "Average CPU Usage (percent): {:.2}", t.avg_cpu_usage)?;
    writeln!(out, "Average RAM Usage (percent): {:.2}", t.avg_memory_usage)?;
    Ok(())
}
