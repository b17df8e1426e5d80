use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::config::Config;
use crate::models::{ActiveSetData, SessionStats};
use crate::services::audio_cues::{AudioCue, AudioCueDispatcher, ChannelCueSink};
use crate::services::exercise_detector::detector_for;
use crate::services::session_logger::{SessionLogger, SetOutcome};
use crate::services::synthetic_pose::{rep_trajectory, SyntheticFrame, SyntheticPoseSource};
use crate::services::workout_session::{SessionTracker, WorkoutPipeline};
use crate::storage::{InMemoryRepStore, RepStore};

/// Camera cadence of the synthetic feed (about 30fps)
const FRAME_INTERVAL_MS: u64 = 33;
/// Gap between sets on the synthetic clock
const REST_BETWEEN_SETS_MS: u64 = 90_000;
const OCCLUDED_FRAMES: usize = 15;

#[derive(Args)]
pub struct SimulateCommand {
    /// Exercise name
    #[arg(short, long, default_value = "bicep curl")]
    exercise: String,

    /// Reps per set
    #[arg(short, long, default_value_t = 10)]
    reps: u32,

    /// Number of sets
    #[arg(short, long, default_value_t = 1)]
    sets: u32,

    /// Weight used for every set
    #[arg(short, long)]
    weight: Option<f64>,

    /// Frames per rep
    #[arg(long, default_value_t = 45)]
    frames_per_rep: usize,

    /// Hide the key landmarks for a moment before each set
    #[arg(long)]
    occlusion: bool,

    /// Make storage fail at the start of the first set
    #[arg(long)]
    flaky_storage: bool,

    /// Print the session report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulationReport {
    session_id: String,
    local_session: bool,
    sets: Vec<SetOutcome>,
    stats: SessionStats,
}

impl SimulateCommand {
    pub async fn execute(self, config: &Config, offline: bool) -> Result<()> {
        let profile = detector_for(&self.exercise);
        let memory_store = (!offline && config.storage.enabled).then(InMemoryRepStore::new);
        let store = memory_store
            .clone()
            .map(|store| Arc::new(store) as Arc<dyn RepStore>);

        let mut tracker =
            SessionTracker::start(store.clone(), config.retry_config(), "local-user", None).await;

        let (tx, mut rx) = unbounded_channel();
        let cues = AudioCueDispatcher::with_cooldown(
            Arc::new(ChannelCueSink::new(tx)),
            config.cues.occlusion_cooldown_ms,
        );
        let logger = SessionLogger::new(store, config.session_logger_config());
        let mut pipeline = WorkoutPipeline::new(
            SyntheticPoseSource,
            config.frame_processor_config(),
            logger,
            cues,
        );

        if !self.json {
            println!(
                "Simulating {} x {} {} ({} profile)",
                self.sets,
                self.reps,
                self.exercise.bold(),
                profile.name
            );
            println!("Session: {}", tracker.session_id());
            println!();
        }

        let mut clock_ms = 0;
        let mut outcomes = Vec::new();

        for set_number in 1..=self.sets {
            if self.flaky_storage && set_number == 1 {
                if let Some(store) = &memory_store {
                    store.fail_next_requests(2);
                }
            }

            pipeline
                .start_set(ActiveSetData {
                    session_id: tracker.session_id().to_string(),
                    exercise_id: profile.name.to_lowercase().replace(' ', "-"),
                    exercise_name: self.exercise.clone(),
                    set_number,
                    weight: self.weight,
                    target_reps: Some(self.reps),
                })
                .await;

            let trajectory = rep_trajectory(&profile, self.reps, self.frames_per_rep);
            let mut frames = Vec::with_capacity(trajectory.len() + OCCLUDED_FRAMES);
            if self.occlusion {
                for _ in 0..OCCLUDED_FRAMES {
                    let mut frame = SyntheticFrame::new(profile, trajectory[0], clock_ms);
                    frame.occluded = true;
                    frames.push(frame);
                    clock_ms += FRAME_INTERVAL_MS;
                }
            }
            for angle in trajectory {
                frames.push(SyntheticFrame::new(profile, angle, clock_ms));
                clock_ms += FRAME_INTERVAL_MS;
            }

            for frame in &frames {
                pipeline.on_frame(frame, frame.timestamp_ms);
            }
            let elapsed_seconds = pipeline.snapshot().elapsed_seconds;

            let Some(outcome) = pipeline.end_set().await else {
                continue;
            };
            tracker.record_set(&outcome);

            if !self.json {
                print_cues(&mut rx);
                print_set(&outcome, elapsed_seconds);
            }
            outcomes.push(outcome);
            clock_ms += REST_BETWEEN_SETS_MS;
        }

        let stats = tracker
            .finalize_session(None)
            .await
            .context("Failed to finalize session")?;

        if self.json {
            let report = SimulationReport {
                session_id: tracker.session_id().to_string(),
                local_session: tracker.session().local,
                sets: outcomes,
                stats,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        println!();
        println!("{}", "Session Summary".bold());
        println!("────────────────────────────────");
        println!("  Sets:   {}", stats.total_sets);
        println!("  Reps:   {}", stats.total_reps);
        println!("  Volume: {:.1}", stats.total_volume);
        if tracker.session().local {
            println!("  {}", "Local session, nothing was stored".yellow());
        }

        Ok(())
    }
}

fn print_cues(rx: &mut UnboundedReceiver<AudioCue>) {
    while let Ok(cue) = rx.try_recv() {
        let line = format!("  ♪ {}", cue);
        match cue {
            AudioCue::OcclusionWarning => println!("{}", line.yellow()),
            AudioCue::TrackingRestored => println!("{}", line.green()),
            _ => println!("{}", line.dimmed()),
        }
    }
}

fn print_set(outcome: &SetOutcome, elapsed_seconds: u64) {
    println!(
        "✓ Set {}: {} reps in {}s · volume {:.1}",
        outcome.set_number,
        outcome.completed_reps,
        elapsed_seconds,
        outcome.volume()
    );

    if outcome.local_only {
        println!("  {}", "Tracked locally only".yellow());
    } else {
        println!("  Stored {} reps in set {}", outcome.synced_reps, outcome.set_id.as_deref().unwrap_or("-"));
    }
    if outcome.unsynced_reps > 0 {
        println!(
            "  {}",
            format!("✗ {} reps could not be stored", outcome.unsynced_reps).red()
        );
    }
    println!();
}
