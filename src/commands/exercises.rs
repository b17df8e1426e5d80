use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::collections::BTreeMap;

use crate::services::exercise_detector::{detector_for, registered_exercises, PrimaryMetric};

#[derive(Args)]
pub struct ExercisesCommand {
    /// Show the profile a name resolves to
    #[arg(long)]
    resolve: Option<String>,
}

fn metric_label(metric: PrimaryMetric) -> &'static str {
    match metric {
        PrimaryMetric::ElbowAngle => "elbow angle",
        PrimaryMetric::KneeAngle => "knee angle",
        PrimaryMetric::WristSpread => "wrist spread",
    }
}

impl ExercisesCommand {
    pub fn execute(self) -> Result<()> {
        if let Some(name) = self.resolve {
            let profile = detector_for(&name);
            println!(
                "{} -> {} ({}, up {:.0}°, down {:.0}°)",
                name,
                profile.name.bold(),
                metric_label(profile.metric),
                profile.angle_threshold_up,
                profile.angle_threshold_down
            );
            return Ok(());
        }

        let mut profiles: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for alias in registered_exercises() {
            profiles.entry(detector_for(alias).name).or_default().push(alias);
        }

        println!("{}", "Supported Exercises".bold());
        println!("────────────────────────────────");
        for (name, aliases) in profiles {
            let profile = detector_for(aliases[0]);
            println!();
            println!(
                "{}  {} · up {:.0}° · down {:.0}°",
                name.green().bold(),
                metric_label(profile.metric),
                profile.angle_threshold_up,
                profile.angle_threshold_down
            );
            println!("  {}", aliases.join(", ").dimmed());
        }
        println!();
        println!("Other names use the generic elbow profile.");

        Ok(())
    }
}
