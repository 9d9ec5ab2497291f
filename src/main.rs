use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::sync::Arc;
use tracing::{info, Level};

use peer_quorum::{
    config::EngineConfig,
    model::{ArtifactId, ArtifactKind, Domain, Review},
    reputation::{InMemoryLedger, ReputationScope},
    review::ReviewEngine,
};

/// A scenario to replay against a fresh engine
#[derive(Debug, Deserialize)]
struct Script {
    /// Reputation granted before the first step
    #[serde(default)]
    seed: Vec<SeedGrant>,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct SeedGrant {
    principal: String,
    scope: ReputationScope,
    amount: i64,
}

/// Artifacts are referred to by a script-local alias
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    Register {
        alias: String,
        author: String,
        kind: ArtifactKind,
        domain: Domain,
        content_ref: String,
    },
    Join {
        artifact: String,
        principal: String,
    },
    Submit {
        artifact: String,
        principal: String,
        review: Review,
    },
}

impl Step {
    fn op(&self) -> &'static str {
        match self {
            Step::Register { .. } => "register",
            Step::Join { .. } => "join",
            Step::Submit { .. } => "submit",
        }
    }
}

#[derive(Debug, Serialize)]
struct StepOutcome {
    step: usize,
    op: &'static str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// Everything a replay produced: one outcome per step, then the final state
struct Replay {
    outcomes: Vec<StepOutcome>,
    summary: serde_json::Value,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = EngineConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check PEER_QUORUM_* environment variables.");
        e
    })?;

    init_logging(&config)?;

    let script = read_script().context("Failed to read scenario script")?;
    let replay = replay(&config, script).await?;

    for outcome in &replay.outcomes {
        println!("{}", serde_json::to_string(outcome)?);
    }
    println!("{}", serde_json::to_string_pretty(&replay.summary)?);

    Ok(())
}

/// Run `script` against a fresh engine and in-memory ledger
async fn replay(config: &EngineConfig, script: Script) -> Result<Replay> {
    info!(
        seed = script.seed.len(),
        steps = script.steps.len(),
        capacity = config.pool.capacity,
        "Replaying scenario"
    );

    let ledger = Arc::new(InMemoryLedger::new(config.ledger));
    for grant in &script.seed {
        ledger
            .grant(&grant.principal, grant.scope, grant.amount)
            .await
            .with_context(|| format!("Failed to seed {}", grant.principal))?;
    }

    let engine = ReviewEngine::new(config, ledger.clone())?;
    let mut aliases: HashMap<String, ArtifactId> = HashMap::new();
    let mut principals: BTreeSet<String> = script.seed.iter().map(|g| g.principal.clone()).collect();
    let mut outcomes = Vec::with_capacity(script.steps.len());

    for (index, step) in script.steps.into_iter().enumerate() {
        let op = step.op();
        let outcome = match step {
            Step::Register {
                alias,
                author,
                kind,
                domain,
                content_ref,
            } => {
                principals.insert(author.clone());
                let result = engine
                    .register_artifact(&author, kind, domain, &content_ref)
                    .await
                    .map(|id| {
                        let value = json!({ "alias": alias, "artifact": id });
                        aliases.insert(alias, id);
                        value
                    });
                outcome(index, op, result)
            }
            Step::Join {
                artifact,
                principal,
            } => {
                principals.insert(principal.clone());
                let id = resolve(&aliases, &artifact);
                let result = engine
                    .join_pool(&principal, &id)
                    .await
                    .map(|slot| json!({ "slot": slot }));
                outcome(index, op, result)
            }
            Step::Submit {
                artifact,
                principal,
                review,
            } => {
                let id = resolve(&aliases, &artifact);
                let result = match engine.submit_review(&principal, &id, review).await {
                    Ok(()) => Ok(json!({
                        "pool": engine.get_pool_status(&id).await.ok(),
                        "status": engine.get_artifact_status(&id).await.ok(),
                    })),
                    Err(e) => Err(e),
                };
                outcome(index, op, result)
            }
        };
        outcomes.push(outcome);
    }

    // Final state: every artifact with its verdict, then every principal's reputation
    let mut artifacts = Vec::new();
    for artifact in engine.list_artifacts().await {
        let verdict = engine.get_verdict(&artifact.id).await;
        let alias = aliases
            .iter()
            .find(|(_, id)| **id == artifact.id)
            .map(|(alias, _)| alias.clone());
        artifacts.push(json!({
            "alias": alias,
            "artifact": artifact,
            "verdict": verdict,
        }));
    }

    let mut reputation = Vec::new();
    for principal in &principals {
        if let Some(score) = ledger.snapshot(principal).await {
            reputation.push(score);
        }
    }

    Ok(Replay {
        outcomes,
        summary: json!({
            "artifacts": artifacts,
            "reputation": reputation,
            "audit_entries": engine.audit().len().await,
        }),
    })
}

/// Unknown aliases fall through as raw ids so the engine reports them
fn resolve(aliases: &HashMap<String, ArtifactId>, artifact: &str) -> ArtifactId {
    aliases
        .get(artifact)
        .cloned()
        .unwrap_or_else(|| ArtifactId::new(artifact))
}

fn outcome(
    step: usize,
    op: &'static str,
    result: Result<serde_json::Value, peer_quorum::ReviewError>,
) -> StepOutcome {
    match result {
        Ok(value) => StepOutcome {
            step,
            op,
            ok: true,
            result: Some(value),
            error: None,
            message: None,
        },
        Err(e) => StepOutcome {
            step,
            op,
            ok: false,
            result: None,
            error: Some(e.code().to_string()),
            message: Some(e.to_string()),
        },
    }
}

/// Script from the path given as first argument, or stdin
fn read_script() -> Result<Script> {
    let raw = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path))?,
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read stdin")?;
            raw
        }
    };
    serde_json::from_str(&raw).context("Invalid scenario script")
}

/// Logs go to stderr so stdout stays machine-readable
fn init_logging(config: &EngineConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    if !config.logging.log_principals {
        info!("Principal identifiers are shortened in logs");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moderation(relevance: u8, clarity: u8, originality: u8) -> serde_json::Value {
        json!({
            "kind": "moderation",
            "scores": {
                "relevance": relevance,
                "correctness": 1,
                "clarity": clarity,
                "originality": originality,
            },
            "suggested_difficulty": "medium",
            "suggested_category": "security",
            "suggested_duration_minutes": 120,
        })
    }

    #[tokio::test]
    async fn test_three_reviewer_script() {
        // Weighted scores 80, 85 and 90
        let reviews = [
            ("r1", moderation(10, 5, 5)),
            ("r2", moderation(9, 7, 7)),
            ("r3", moderation(10, 10, 5)),
        ];
        let mut steps = vec![json!({
            "op": "register",
            "alias": "c1",
            "author": "alice",
            "kind": "challenge",
            "domain": "security",
            "content_ref": "ipfs://challenge",
        })];
        for (reviewer, _) in &reviews {
            steps.push(json!({ "op": "join", "artifact": "c1", "principal": reviewer }));
        }
        for (reviewer, review) in &reviews {
            steps.push(json!({
                "op": "submit",
                "artifact": "c1",
                "principal": reviewer,
                "review": review,
            }));
        }
        let seed: Vec<_> = reviews
            .iter()
            .map(|(reviewer, _)| {
                json!({ "principal": reviewer, "scope": { "domain": "security" }, "amount": 100 })
            })
            .collect();

        let script: Script = serde_json::from_value(json!({ "seed": seed, "steps": steps })).unwrap();
        let replay = replay(&EngineConfig::default(), script).await.unwrap();

        assert_eq!(replay.outcomes.len(), 7);
        assert!(replay.outcomes.iter().all(|o| o.ok), "{:?}", replay.outcomes);
        assert_eq!(replay.outcomes[3].result, Some(json!({ "slot": 2 })));

        let artifacts = replay.summary["artifacts"].as_array().unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0]["alias"], "c1");
        assert_eq!(artifacts[0]["verdict"]["quality_score"], 85);
        assert_eq!(artifacts[0]["verdict"]["review_count"], 3);
    }

    #[tokio::test]
    async fn test_failed_step_is_reported() {
        let script: Script = serde_json::from_value(json!({
            "steps": [{ "op": "join", "artifact": "missing", "principal": "r1" }]
        }))
        .unwrap();
        let replay = replay(&EngineConfig::default(), script).await.unwrap();

        assert!(!replay.outcomes[0].ok);
        assert_eq!(replay.outcomes[0].error.as_deref(), Some("unknown_artifact"));
        assert_eq!(replay.summary["artifacts"], json!([]));
    }
}
