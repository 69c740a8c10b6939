use anyhow::bail;
use cycler_core::Schedule;
use cycler_state::{DISABLED, Override};
use tracing::info;

use super::{load_config, open_state};
use crate::{OverrideAction, StoreArgs};

pub fn dispatch(args: &StoreArgs, action: OverrideAction) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let store = open_state(args, &config)?;

    match action {
        OverrideAction::Set {
            kind,
            id,
            schedule,
            disable,
        } => {
            let record = build_override(schedule, disable)?;
            store.put_override(kind, &id, &record)?;
            info!(%kind, %id, "override saved");
            println!("✓ {kind}/{id}: {}", describe(&record));
        }
        OverrideAction::Clear { kind, id } => {
            if store.delete_override(kind, &id)? {
                println!("✓ {kind}/{id}: override removed");
            } else {
                println!("{kind}/{id}: no override");
            }
        }
        OverrideAction::List => {
            let overrides = store.list_overrides()?;
            if overrides.is_empty() {
                println!("No overrides.");
            }
            for (resource, record) in overrides {
                println!("{:<40} {}", resource.to_string(), describe(&record));
            }
        }
    }
    Ok(())
}

fn build_override(schedule: Option<String>, disable: bool) -> anyhow::Result<Override> {
    if disable {
        return Ok(Override {
            schedule: None,
            status: Some(DISABLED.to_string()),
        });
    }
    let Some(schedule) = schedule else {
        bail!("either --schedule or --disable is required");
    };
    // Store the canonical form so a bad override never reaches a pass.
    let parsed = Schedule::parse(&schedule)?;
    Ok(Override {
        schedule: Some(parsed.to_string()),
        status: None,
    })
}

fn describe(record: &Override) -> String {
    match (&record.status, &record.schedule) {
        (Some(status), _) if record.is_disabled() => status.clone(),
        (_, Some(schedule)) => format!("schedule {schedule}"),
        (Some(status), None) => format!("status {status}"),
        (None, None) => "empty".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disable_wins() {
        let record = build_override(None, true).unwrap();
        assert!(record.is_disabled());
        assert_eq!(describe(&record), "disabled");
    }

    #[test]
    fn schedule_is_validated() {
        let record = build_override(Some("MTWTF-- 0700-1900".into()), false).unwrap();
        assert_eq!(record.schedule.as_deref(), Some("MTWTF-- 0700-1900"));
        assert!(build_override(Some("XTWTF-- 0700-1900".into()), false).is_err());
        assert!(build_override(None, false).is_err());
    }
}
