//! Demo pipeline: read a file, uppercase its text, write the result, all
//! scheduled as a chain through the execution governor.

use std::sync::Arc;

use anyhow::Result;
use serde_json::{Map, Value, json};
use tracing::info;

use tool_cache::{CacheConfig, ResultCache};
use tool_chain::{ChainDefinition, ChainRunner, ChainStep};
use tool_executor::ToolExecutor;
use tool_primitives::{
    CacheControl, ExecutionContext, ParameterSpec, ParameterType, PermissionClass, Permissions,
    ToolDescriptor, ToolId,
};
use tool_registry::{ToolError, ToolRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    info!("=== Toolgate: Chain Pipeline Example ===");

    let work_dir = std::env::temp_dir().join("toolgate-demo");
    tokio::fs::create_dir_all(&work_dir).await?;
    tokio::fs::write(work_dir.join("in.txt"), "hello from the pipeline").await?;

    let registry = build_registry()?;
    let cache = Arc::new(ResultCache::new(CacheConfig::default()));
    let executor = Arc::new(ToolExecutor::new(registry).with_cache(Arc::clone(&cache)));
    let runner = ChainRunner::new(executor);

    let chain = ChainDefinition::builder("report", "Daily report")
        .step(
            ChainStep::new("read", ToolId::new("file.read")?)?
                .with_parameters(params(json!({"path": "in.txt"}))),
        )
        .step(
            ChainStep::new("transform", ToolId::new("text.upper")?)?
                .depends_on("read")
                .with_parameters(params(json!({"text": "${steps.read.value}"}))),
        )
        .step(
            ChainStep::new("write", ToolId::new("file.write")?)?
                .depends_on("transform")
                .with_parameters(params(json!({
                    "path": "out.txt",
                    "content": "${steps.transform.value}",
                }))),
        )
        .build()?;

    let ctx = ExecutionContext::builder()
        .working_dir(&work_dir)
        .permissions(Permissions::none().allow_file_read().allow_file_write())
        .cache_control(CacheControl::enabled())
        .build();

    // First run executes every step; the second serves the cacheable
    // transform from the result cache.
    for round in 1..=2 {
        let result = runner.run(&chain, &ctx).await?;
        info!(
            round,
            success = result.is_success(),
            duration_ms = result.duration().as_millis() as u64,
            "chain run finished"
        );
    }

    let written = tokio::fs::read_to_string(work_dir.join("out.txt")).await?;
    info!("out.txt now contains: {written}");

    let stats = cache.statistics().await;
    info!(
        entries = stats.entries,
        hits = stats.hits,
        misses = stats.misses,
        hit_ratio = format!("{:.2}", stats.hit_ratio()),
        "cache statistics"
    );

    Ok(())
}

fn params(map: Value) -> Map<String, Value> {
    match map {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn build_registry() -> Result<Arc<ToolRegistry>> {
    let registry = Arc::new(ToolRegistry::new());

    registry.register(
        ToolDescriptor::builder(ToolId::new("file.read")?)
            .description("Reads a file relative to the working directory")
            .parameter(ParameterSpec::required("path", ParameterType::String)?)
            .requires(PermissionClass::FileSystemRead)
            .build()?,
        |params: Map<String, Value>, ctx: ExecutionContext| async move {
            let path = ctx.working_dir().join(expect_str(&params, "path")?);
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|err| ToolError::execution(err.to_string()))?;
            Ok(Value::String(text))
        },
    )?;

    registry.register(
        ToolDescriptor::builder(ToolId::new("text.upper")?)
            .description("Uppercases the supplied text")
            .parameter(ParameterSpec::required("text", ParameterType::String)?)
            .cacheable(true)
            .build()?,
        |params: Map<String, Value>, _ctx: ExecutionContext| async move {
            Ok(Value::String(expect_str(&params, "text")?.to_uppercase()))
        },
    )?;

    registry.register(
        ToolDescriptor::builder(ToolId::new("file.write")?)
            .description("Writes content to a file relative to the working directory")
            .parameter(ParameterSpec::required("path", ParameterType::String)?)
            .parameter(ParameterSpec::required("content", ParameterType::String)?)
            .requires(PermissionClass::FileSystemWrite)
            .build()?,
        |params: Map<String, Value>, ctx: ExecutionContext| async move {
            let path = ctx.working_dir().join(expect_str(&params, "path")?);
            let content = expect_str(&params, "content")?.to_owned();
            tokio::fs::write(&path, &content)
                .await
                .map_err(|err| ToolError::execution(err.to_string()))?;
            Ok(json!({"path": params["path"], "bytes": content.len()}))
        },
    )?;

    Ok(registry)
}

fn expect_str<'a>(params: &'a Map<String, Value>, key: &str) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::execution(format!("`{key}` must be a string")))
}
