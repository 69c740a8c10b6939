use std::path::Path;

use cycler_core::ResourceKind;

use super::{load_config, parse_clock};

pub fn check(config_path: &Path, at: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let now = parse_clock(at)?;

    println!("Configuration: {}", config_path.display());
    println!("Evaluated at:  {}", now.format("%a %Y-%m-%d %H:%M:%S %z"));
    println!();

    for task in &config.tasks {
        match task.parsed_schedule()? {
            Some(schedule) => {
                let state = if schedule.is_active_at(&now) { "on" } else { "off" };
                println!("{:<24} {}  {}", task.name, schedule, state);
            }
            None => println!("{:<24} (no task schedule, overrides only)", task.name),
        }
        println!(
            "  prefix={:?} dryrun={}",
            config.bucket_prefix_for(task),
            config.dryrun_for(task)
        );
        for kind in ResourceKind::ALL {
            let selection = task.selection(kind);
            if selection.include.is_empty() {
                continue;
            }
            println!(
                "  {:<14} include={:?} exclude={:?} action={}",
                kind.as_str(),
                selection.include,
                selection.exclude,
                task.action(kind)
            );
        }
    }

    println!();
    println!("✓ {} task(s) valid", config.tasks.len());
    Ok(())
}
