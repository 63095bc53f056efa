// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod commands;

use acelo_backend::{Acelo, AuthClient};
use acelo_core::config::AceloConfig;
use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config file)
    #[arg(long, env = "ACELO_BACKEND_URL")]
    backend_url: Option<String>,

    /// Account email
    #[arg(long, env = "ACELO_EMAIL")]
    email: Option<String>,

    /// Account password
    #[arg(long, env = "ACELO_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Browse context documents
    Contexts {
        #[command(subcommand)]
        action: ContextsAction,
    },
    /// Browse prompt templates
    Prompts {
        #[command(subcommand)]
        action: PromptsAction,
    },
    /// Print the final prompt for a template and contexts
    Compose {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Strip markdown from the output
        #[arg(long)]
        plain: bool,
        /// Show category labels next to context titles
        #[arg(long, conflicts_with = "plain")]
        labelled: bool,
    },
    /// Compose and send to the generation endpoint
    Generate {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Write the export JSON to this file
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Suggest contexts for a prompt from its usage history
    Suggest {
        #[arg(long)]
        prompt: String,
        /// Contexts already selected
        #[arg(long = "selected")]
        selected: Vec<String>,
    },
    /// Webhook automations
    Automations {
        #[command(subcommand)]
        action: AutomationsAction,
    },
    /// Files in the asset bucket
    Assets {
        #[command(subcommand)]
        action: AssetsAction,
    },
    /// Dashboard counts
    Stats,
}

#[derive(clap::Args, Debug, Clone)]
struct SelectionArgs {
    /// Prompt id
    #[arg(long)]
    prompt: String,
    /// Context id, in composition order (repeatable)
    #[arg(long = "context")]
    contexts: Vec<String>,
    /// Free-text context appended last
    #[arg(long)]
    custom: Option<String>,
}

#[derive(Subcommand, Debug)]
enum ContextsAction {
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum PromptsAction {
    List,
    /// Version history of one prompt
    Versions { id: String },
}

#[derive(Subcommand, Debug)]
enum AutomationsAction {
    List,
    /// Run history
    Runs {
        #[arg(long)]
        automation: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Run a prompt/context automation
    Run {
        #[arg(long)]
        automation: String,
        /// Address the automation reports to
        #[arg(long = "to")]
        email_address: String,
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long = "context")]
        contexts: Vec<String>,
        /// Prompt text to send instead of a stored prompt
        #[arg(long, conflicts_with = "prompt")]
        prompt_text: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum AssetsAction {
    List,
    Upload {
        file: PathBuf,
        /// Object name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },
    Remove {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Print a signed download URL
    Url { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "acelo=info,acelo_prompts=info,acelo_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    // Load configuration
    let mut config = AceloConfig::load(args.config.clone())?;

    // Apply CLI overrides
    if let Some(url) = args.backend_url.clone() {
        config.backend.url = url;
    }
    config.validate()?;

    let session = match (&args.email, &args.password) {
        (Some(email), Some(password)) => Some(
            AuthClient::new(&config.backend)
                .sign_in(email, password)
                .await
                .context("sign-in failed")?,
        ),
        _ => {
            tracing::warn!("No credentials given (set ACELO_EMAIL and ACELO_PASSWORD)");
            None
        }
    };

    let acelo = Acelo::connect(config, session);
    commands::run(&acelo, args.command).await
}
