//! Cache Entanglement demo
//!
//! Builds a small company/employee/card graph, walks it through caching,
//! an upstream update and a cascading delete, and logs what happens.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_entanglement::{
    spawn_sweep_task, Config, EntanglementAsync, EntanglementSync, ResolvedDependencies, Sweep,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Employee {
    name: String,
    company: String,
}

#[derive(Debug, Clone)]
struct Card {
    employee: Employee,
    tel: String,
}

/// Entry point for the demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the node graph
/// 4. Start background sweep task
/// 5. Cache, update and delete through the graph
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_entanglement=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cache Entanglement demo");

    let config = Config::from_env();
    info!(
        "Configuration loaded: default_lifespan={:?}, sweep_interval={:?}",
        config.default_lifespan, config.sweep_interval
    );

    let company = EntanglementSync::builder(|_key, _deps, name: &String| Ok(name.clone()))
        .label("company")
        .config(&config)
        .build()?;

    let employee = EntanglementSync::builder(|_key, deps, name: &String| {
        let company = deps.get::<String>("company")?;
        Ok(Employee {
            name: name.clone(),
            company: company.raw().clone(),
        })
    })
    .label("employee")
    .dependency("company", &company)
    .config(&config)
    .build()?;

    let card = EntanglementAsync::builder(
        |_key, deps: ResolvedDependencies, tel: String| async move {
            let employee = deps.get::<Employee>("employee")?;
            Ok::<_, anyhow::Error>(Card {
                employee: employee.deep_copy()?,
                tel,
            })
        },
    )
    .label("card")
    .dependency("employee", &employee)
    .config(&config)
    .build()?;

    let targets = vec![
        Arc::new(company.clone()) as Arc<dyn Sweep>,
        Arc::new(employee.clone()) as Arc<dyn Sweep>,
        Arc::new(card.clone()) as Arc<dyn Sweep>,
    ];
    let sweep_handle = spawn_sweep_task(targets, config.sweep_interval);

    company.cache("github", "Github".to_string())?;
    employee.cache("github/john", "john".to_string())?;
    let before = card
        .cache("github/john/card", "xxx-xxxx-xxxx".to_string())
        .await?;
    info!(card = ?before.raw(), "Card cached");

    company.update("github", "Github.com".to_string())?;
    info!(
        dirty = card.is_dirty("github/john/card"),
        "Company renamed, card marked for recomputation"
    );

    let after = card.get("github/john/card").await?;
    let recomputed = after.raw();
    info!(
        name = %recomputed.employee.name,
        company = %recomputed.employee.company,
        tel = %recomputed.tel,
        "Card recomputed"
    );

    company.delete("github");
    info!(
        employees = employee.keys().len(),
        cards = card.keys().len(),
        "Company deleted with its dependents"
    );

    sweep_handle.abort();
    info!("Demo complete");
    Ok(())
}
