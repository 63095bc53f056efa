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

//! Subcommand handlers

use crate::{AssetsAction, AutomationsAction, Command, ContextsAction, PromptsAction, SelectionArgs};
use acelo_backend::Acelo;
use acelo_core::automation::AutomationExecutionData;
use acelo_core::ContextCategory;
use acelo_prompts::{to_plain_text, TokenStatus, WorkflowSession, WorkflowStep};
use anyhow::{Context as _, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

pub async fn run(acelo: &Acelo, command: Command) -> Result<()> {
    match command {
        Command::Contexts {
            action: ContextsAction::List { category, search },
        } => {
            let category = category
                .as_deref()
                .map(str::parse::<ContextCategory>)
                .transpose()?;
            for context in acelo.list_contexts(category, search.as_deref()).await? {
                println!(
                    "{}\t{}\t{}\t{} words",
                    context.id,
                    context.category.label(),
                    context.title,
                    context.word_count()
                );
            }
        }

        Command::Prompts {
            action: PromptsAction::List,
        } => {
            for prompt in acelo.list_prompts().await? {
                println!(
                    "{}\t{}\tv{}",
                    prompt.id,
                    prompt.display_title(),
                    prompt.current_version.unwrap_or(1)
                );
            }
        }

        Command::Prompts {
            action: PromptsAction::Versions { id },
        } => {
            for version in acelo.prompt_versions(&id).await? {
                println!("v{}\t{}", version.version_number, version.title);
            }
        }

        Command::Compose {
            selection,
            plain,
            labelled,
        } => {
            let session = build_session(acelo, &selection).await?;
            let text = if plain {
                to_plain_text(&session.final_prompt())
            } else if labelled {
                session.labelled_prompt()
            } else {
                session.final_prompt()
            };
            println!("{}", text);
            report_tokens(&session);
        }

        Command::Generate { selection, export } => {
            let mut session = build_session(acelo, &selection).await?;
            report_tokens(&session);
            session.go_to(WorkflowStep::Generate);

            let dispatcher = acelo.analytics_dispatcher()?;
            let generator = acelo.generator();
            let generated = session.generate(generator.as_ref(), Some(&dispatcher)).await?;
            println!("{}", generated.text);

            if let Some(path) = export {
                write_export(&path, &session.export_json(chrono::Utc::now())?)?;
                eprintln!("Exported to {}", path.display());
            }

            // Let the usage record land before the runtime shuts down.
            if let Some(handle) = generated.analytics {
                let _ = handle.await;
            }
        }

        Command::Suggest { prompt, selected } => {
            let selected: HashSet<String> = selected.into_iter().collect();
            for context in acelo.suggest_contexts(&prompt, &selected).await? {
                println!("{}\t{}", context.id, context.title);
            }
        }

        Command::Automations { action } => run_automations(acelo, action).await?,

        Command::Assets { action } => run_assets(acelo, action).await?,

        Command::Stats => {
            let stats = acelo.dashboard_stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}

async fn build_session(acelo: &Acelo, selection: &SelectionArgs) -> Result<WorkflowSession> {
    let mut session = acelo.start_workflow(&selection.prompt).await?;
    for context in acelo.contexts_by_ids(&selection.contexts).await? {
        session.selection_mut().select(context);
    }
    if let Some(custom) = &selection.custom {
        session.selection_mut().set_custom_context(custom.as_str());
    }
    Ok(session)
}

fn report_tokens(session: &WorkflowSession) {
    let estimate = session.token_estimate();
    let status = match estimate.status() {
        TokenStatus::Ok => "ok",
        TokenStatus::Warning => "approaching limit",
        TokenStatus::OverLimit => "over limit",
    };
    eprintln!(
        "~{} tokens (prompt {}, context {}), ~${:.4}, {}",
        estimate.total_tokens,
        estimate.prompt_tokens,
        estimate.context_tokens,
        estimate.estimated_cost,
        status
    );
}

async fn run_automations(acelo: &Acelo, action: AutomationsAction) -> Result<()> {
    match action {
        AutomationsAction::List => {
            for automation in acelo.list_automations().await? {
                println!(
                    "{}\t{}\t{}",
                    automation.id,
                    automation.name,
                    if automation.active { "active" } else { "inactive" }
                );
            }
        }

        AutomationsAction::Runs { automation, limit } => {
            for run in acelo.automation_runs(automation.as_deref(), limit).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    run.id,
                    run.automation_id,
                    run.status.as_str(),
                    run.duration_ms
                        .map(|ms| format!("{}ms", ms))
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }

        AutomationsAction::Run {
            automation,
            email_address,
            prompt,
            contexts,
            prompt_text,
        } => {
            let custom_prompt_content = match (&prompt, prompt_text) {
                (Some(id), _) => Some(acelo.get_prompt(id).await?.content),
                (None, text) => text,
            };
            let custom_context_content = if contexts.is_empty() {
                None
            } else {
                let resolved = acelo.contexts_by_ids(&contexts).await?;
                Some(
                    resolved
                        .into_iter()
                        .map(|c| (c.id, c.content))
                        .collect::<BTreeMap<_, _>>(),
                )
            };

            let execution = AutomationExecutionData {
                automation_id: automation,
                prompt_id: prompt,
                context_ids: (!contexts.is_empty()).then_some(contexts),
                email_address,
                custom_prompt_content,
                custom_context_content,
            };
            let result = acelo.run_enhanced_automation(&execution).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}

async fn run_assets(acelo: &Acelo, action: AssetsAction) -> Result<()> {
    match action {
        AssetsAction::List => {
            for file in acelo.list_assets().await? {
                println!(
                    "{}\t{}\t{}",
                    file.name,
                    file.size().map(|s| s.to_string()).unwrap_or_default(),
                    file.mime_type().unwrap_or("")
                );
            }
        }

        AssetsAction::Upload { file, name } => {
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .context("cannot derive an object name from the path")?,
            };
            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let path = acelo
                .upload_asset(&name, bytes, content_type_for(&name))
                .await?;
            println!("{}", path);
        }

        AssetsAction::Remove { names } => {
            acelo.remove_assets(&names).await?;
        }

        AssetsAction::Url { name } => {
            println!("{}", acelo.asset_url(&name).await?);
        }
    }
    Ok(())
}

fn content_type_for(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => return None,
    };
    Some(mime)
}

fn write_export(path: &Path, json: &str) -> Result<()> {
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("Deck.PDF"), Some("application/pdf"));
        assert_eq!(content_type_for("notes.md"), Some("text/markdown"));
        assert_eq!(content_type_for("archive.xyz"), None);
        assert_eq!(content_type_for("README"), None);
    }

    #[test]
    fn test_write_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        write_export(&path, "{\"prompt\":\"x\"}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"prompt\":\"x\"}");

        let missing = dir.path().join("no-such-dir").join("export.json");
        assert!(write_export(&missing, "{}").is_err());
    }
}
