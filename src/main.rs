// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use cyclophone::audio::mock::RecordingBackend;
use cyclophone::audio::{NodeId, Param};
use cyclophone::config::{EngineConfig, SampleMap, SoundfontTable};
use cyclophone::engine::TriggerEngine;
use cyclophone::hap::Hap;
use cyclophone::samples::SampleResolver;
use cyclophone::time::{Rational, TimeSpan};
use tracing_subscriber::EnvFilter;

const PLAN_SAMPLE_RATE: u32 = 48000;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Triggers pattern events as audio node chains."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the banks in a sample map.
    Banks {
        /// The path to the sample map JSON file.
        sample_map: PathBuf,
    },
    /// Triggers one event against a recording backend and prints the node
    /// chain it builds. No audio device is used.
    Plan {
        /// The path to the sample map JSON file.
        sample_map: PathBuf,
        /// The event's controls as a JSON object, e.g. '{"s": "bd", "cutoff": 800}'.
        value: String,
        /// Event duration in seconds.
        #[arg(long, default_value_t = 1.0)]
        duration: f64,
        /// Seconds from now until the event starts.
        #[arg(long, default_value_t = 0.0)]
        deadline: f64,
        /// Engine defaults (YAML).
        #[arg(long)]
        config: Option<PathBuf>,
        /// A soundfont table (JSON).
        #[arg(long)]
        soundfonts: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Banks { sample_map } => {
            let samples = SampleMap::deserialize(&sample_map)?;
            if samples.is_empty() {
                println!("No banks found in {}.", sample_map.display());
                return Ok(());
            }

            println!("Banks (count: {}):", samples.len());
            for name in samples.names() {
                if let Some(bank) = samples.bank(name) {
                    println!(
                        "- {} ({}, {} samples)",
                        name,
                        bank.kind(),
                        bank.sample_count()
                    );
                }
            }
        }
        Commands::Plan {
            sample_map,
            value,
            duration,
            deadline,
            config,
            soundfonts,
        } => plan(
            &sample_map,
            &value,
            duration,
            deadline,
            config.as_deref(),
            soundfonts.as_deref(),
        )
        .await?,
    }

    Ok(())
}

async fn plan(
    sample_map: &Path,
    value: &str,
    duration: f64,
    deadline: f64,
    config: Option<&Path>,
    soundfonts: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let config = match config {
        Some(path) => EngineConfig::deserialize(path)?,
        None => EngineConfig::default(),
    };
    let mut resolver =
        SampleResolver::new(SampleMap::deserialize(sample_map)?, config.default_note());
    if let Some(path) = soundfonts {
        resolver = resolver.with_soundfonts(SoundfontTable::deserialize(path)?);
    }

    let backend = Arc::new(RecordingBackend::new(PLAN_SAMPLE_RATE));
    let engine = TriggerEngine::new(backend.clone(), resolver, config)?;

    let span = TimeSpan::new(Rational::new(0, 1), Rational::new(1, 1));
    let hap = Hap::new(Some(span), span, serde_json::from_str(value)?);

    let Some(voice) = engine.try_trigger(&hap, deadline, duration).await? else {
        println!("Nothing to play.");
        return Ok(());
    };

    println!(
        "Voice (start {:.3}s, stop {:.3}s):",
        voice.start, voice.stop
    );
    for node in backend.chain_from(voice.source) {
        print_node(&backend, node);
    }

    if !voice.sends.is_empty() {
        println!("\nSends:");
        for send in &voice.sends {
            print_node(&backend, *send);
            if let Some(bus) = backend.node(*send).and_then(|node| node.outputs.first().copied()) {
                print!("  ");
                print_node(&backend, bus);
            }
        }
    }

    if let Some(envelope) = voice.chain.get(1).and_then(|node| backend.node(*node)) {
        println!("\nEnvelope:");
        for automation in envelope.automation_of(Param::Gain) {
            println!("- {:?}", automation);
        }
    }

    Ok(())
}

fn print_node(backend: &RecordingBackend, node: NodeId) {
    if let Some(recorded) = backend.node(node) {
        println!("- {} {}", node, recorded.kind);
    }
}
