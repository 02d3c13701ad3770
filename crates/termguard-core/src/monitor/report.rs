//! Status report rendering.
//!
//! Plain-text reports built from provider data; the router escapes and
//! fences them before sending.

use super::metrics::{
    DiskUsage, MetricSnapshot, NetworkUsage, ProcessSample, format_bytes, format_uptime,
};

pub fn status_report(snapshot: &MetricSnapshot) -> String {
    let (one, five, fifteen) = snapshot.load_avg;
    format!(
        "System status\n\
         Uptime:   {}\n\
         Load avg: {:.2} {:.2} {:.2}\n\
         CPU:      {:.1}%\n\
         RAM:      {:.1}% ({} / {})\n\
         Swap:     {} / {}\n\
         Disk:     {:.1}% (fullest partition)",
        format_uptime(snapshot.uptime_secs),
        one,
        five,
        fifteen,
        snapshot.cpu_percent,
        snapshot.ram_percent,
        format_bytes(snapshot.ram_used),
        format_bytes(snapshot.ram_total),
        format_bytes(snapshot.swap_used),
        format_bytes(snapshot.swap_total),
        snapshot.disk_percent,
    )
}

pub fn process_report(processes: &[ProcessSample]) -> String {
    if processes.is_empty() {
        return "No processes to report".to_string();
    }
    let mut out = String::from("Top processes by CPU\n");
    out.push_str(&format!(
        "{:<8} {:<24} {:>6} {:>10}\n",
        "PID", "NAME", "CPU%", "MEM"
    ));
    for p in processes {
        let name: String = p.name.chars().take(24).collect();
        out.push_str(&format!(
            "{:<8} {:<24} {:>6.1} {:>10}\n",
            p.pid,
            name,
            p.cpu_percent,
            format_bytes(p.memory_bytes)
        ));
    }
    out.trim_end().to_string()
}

pub fn memory_report(snapshot: &MetricSnapshot) -> String {
    format!(
        "Memory\n\
         RAM used:  {} / {} ({:.1}%)\n\
         RAM free:  {}\n\
         Swap used: {} / {}",
        format_bytes(snapshot.ram_used),
        format_bytes(snapshot.ram_total),
        snapshot.ram_percent,
        format_bytes(snapshot.ram_total.saturating_sub(snapshot.ram_used)),
        format_bytes(snapshot.swap_used),
        format_bytes(snapshot.swap_total),
    )
}

pub fn disk_report(disks: &[DiskUsage]) -> String {
    if disks.is_empty() {
        return "No mounted partitions found".to_string();
    }
    let mut out = String::from("Disk usage\n");
    for d in disks {
        out.push_str(&format!(
            "{} ({}): {} / {} ({:.1}%)\n",
            d.mount_point,
            d.file_system,
            format_bytes(d.used),
            format_bytes(d.total),
            d.percent
        ));
    }
    out.trim_end().to_string()
}

pub fn network_report(interfaces: &[NetworkUsage]) -> String {
    if interfaces.is_empty() {
        return "No network interfaces found".to_string();
    }
    let mut out = String::from("Network interfaces\n");
    for iface in interfaces {
        out.push_str(&format!(
            "{}: rx {} / tx {}\n",
            iface.interface,
            format_bytes(iface.received),
            format_bytes(iface.transmitted)
        ));
    }
    out.trim_end().to_string()
}
