//! Roster management and the audit-log listing.

use anyhow::Result;
use clap::{Subcommand, ValueEnum};

use faregate_core::FeeStatus;
use faregate_roster::RiderRecord;

use crate::commands::open_roster;
use crate::config::GateConfig;

#[derive(Subcommand)]
pub enum RosterCommands {
    /// Add or update a rider
    Add {
        id: String,
        name: String,
        #[arg(long)]
        department: Option<String>,
        /// Mark the fare as settled
        #[arg(long)]
        paid: bool,
    },
    /// Set a rider's fare state
    SetFee {
        id: String,
        #[arg(value_enum)]
        status: FeeArg,
    },
    /// List riders
    List,
    /// Remove a rider
    Remove {
        id: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FeeArg {
    Paid,
    Unpaid,
}

impl From<FeeArg> for FeeStatus {
    fn from(arg: FeeArg) -> Self {
        match arg {
            FeeArg::Paid => FeeStatus::Paid,
            FeeArg::Unpaid => FeeStatus::Unpaid,
        }
    }
}

pub fn run(config: &GateConfig, command: RosterCommands) -> Result<()> {
    let roster = open_roster(config);
    match command {
        RosterCommands::Add { id, name, department, paid } => {
            roster.upsert_rider(RiderRecord {
                id: id.clone(),
                name,
                department,
                fee_status: if paid { FeeStatus::Paid } else { FeeStatus::Unpaid },
            })?;
            println!("roster row saved for {id}");
        }
        RosterCommands::SetFee { id, status } => {
            let status = FeeStatus::from(status);
            roster.set_fee_status(&id, status)?;
            println!("fee status for {id} set to {}", fee_label(status));
        }
        RosterCommands::List => {
            let riders = roster.list_riders();
            if riders.is_empty() {
                println!("roster is empty");
                return Ok(());
            }
            for rider in &riders {
                println!(
                    "{:<16} {:<24} {:<12} {}",
                    rider.id,
                    rider.name,
                    rider.department.as_deref().unwrap_or("-"),
                    fee_label(rider.fee_status)
                );
            }
        }
        RosterCommands::Remove { id } => {
            roster.remove_rider(&id)?;
            println!("removed {id} from the roster");
        }
    }
    Ok(())
}

pub fn logs(config: &GateConfig, limit: usize) -> Result<()> {
    let roster = open_roster(config);
    let entries = roster.recent_access(limit);
    if entries.is_empty() {
        println!("no gate decisions recorded");
        return Ok(());
    }
    for entry in &entries {
        let confidence = entry
            .confidence
            .map(|c| format!("{c:.2}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<22} {:<16} {:<8} {}",
            entry.timestamp,
            entry.status,
            entry.identity.as_deref().unwrap_or("-"),
            confidence,
            entry.name.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn fee_label(status: FeeStatus) -> &'static str {
    match status {
        FeeStatus::Paid => "paid",
        FeeStatus::Unpaid => "unpaid",
        FeeStatus::Unknown => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_arg_maps_to_status() {
        assert_eq!(FeeStatus::from(FeeArg::Paid), FeeStatus::Paid);
        assert_eq!(FeeStatus::from(FeeArg::Unpaid), FeeStatus::Unpaid);
    }

    #[test]
    fn test_fee_labels() {
        assert_eq!(fee_label(FeeStatus::Paid), "paid");
        assert_eq!(fee_label(FeeStatus::Unpaid), "unpaid");
        assert_eq!(fee_label(FeeStatus::Unknown), "unknown");
    }
}
