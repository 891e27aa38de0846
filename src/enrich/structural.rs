//! Structural Extractor
//!
//! Enriches a decomposed source unit with one concurrent call per
//! non-empty category. Every declaration excerpt is cut to
//! `declaration_units` first. Results are merged by category key.

use futures::future::join_all;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tracing::debug;

use super::RunContext;
use crate::ai::{BudgetEstimator, CallOutcome, CompletionRequest, category_route};
use crate::analyzer::{FunctionInfo, SourceUnit};
use crate::types::{FileResult, Result, StructuralCategory, StructuralResult, result::value_to_text};

/// Category payload with every excerpt truncated to `units`
pub fn category_payload(
    unit: &SourceUnit,
    category: StructuralCategory,
    estimator: &BudgetEstimator,
    units: usize,
) -> Value {
    let excerpt = |code: &str| estimator.truncate_text(code, units);
    let function = |f: &FunctionInfo| {
        json!({
            "parameters": f.parameters,
            "return_type": f.return_type,
            "decorators": f.decorators,
            "is_async": f.is_async,
            "code": excerpt(&f.code),
        })
    };

    match category {
        StructuralCategory::Functions => Value::Object(
            unit.functions
                .iter()
                .map(|(name, f)| (name.clone(), function(f)))
                .collect::<Map<_, _>>(),
        ),
        StructuralCategory::Classes => Value::Object(
            unit.classes
                .iter()
                .map(|(name, class)| {
                    let methods = class
                        .methods
                        .iter()
                        .map(|(method, f)| (method.clone(), function(f)))
                        .collect::<Map<_, _>>();
                    let entry = json!({
                        "bases": class.bases,
                        "decorators": class.decorators,
                        "attributes": class.attributes,
                        "methods": methods,
                    });
                    (name.clone(), entry)
                })
                .collect::<Map<_, _>>(),
        ),
        StructuralCategory::TopLevel => {
            Value::Array(unit.top_level.iter().map(|s| Value::String(excerpt(s))).collect())
        }
    }
}

/// One call per non-empty category, keyed by category
pub async fn enrich_categories(
    ctx: &RunContext,
    filename: &str,
    unit: &SourceUnit,
) -> Result<BTreeMap<StructuralCategory, CallOutcome<StructuralResult>>> {
    let calls = unit.non_empty_categories().into_iter().map(|category| {
        let route = category_route(category);
        let payload = category_payload(
            unit,
            category,
            ctx.policy.estimator(),
            ctx.budget.declaration_units,
        );
        let request = CompletionRequest::new(route.instruction)
            .var("filename", filename)
            .var("ast_analysis", payload)
            .schema((route.schema)());
        async move {
            let outcome = ctx
                .policy
                .call::<StructuralResult>(
                    ctx.client.as_ref(),
                    request,
                    ctx.budget.category_batch_units,
                    &ctx.usage,
                )
                .await;
            (category, outcome)
        }
    });

    let mut results = BTreeMap::new();
    for (category, outcome) in join_all(calls).await {
        results.insert(category, outcome?);
    }
    debug!(filename, categories = results.len(), "Structural categories enriched");
    Ok(results)
}

/// Fold category results into one file result. Imports are attached as-is.
pub fn merge(
    imports: Vec<String>,
    results: BTreeMap<StructuralCategory, CallOutcome<StructuralResult>>,
) -> Result<CallOutcome<FileResult>> {
    let mut file = FileResult {
        imports,
        ..Default::default()
    };
    let mut cause = None;

    for (category, outcome) in results {
        if let CallOutcome::Fallback { cause: c, .. } = &outcome {
            cause.get_or_insert(*c);
        }
        let value = outcome.into_value();
        match category {
            StructuralCategory::TopLevel => {
                file.description = value.description;
                file.code_extractions = value_to_text(value.code_extractions);
            }
            StructuralCategory::Functions => file.functions = Some(serde_json::to_value(&value)?),
            StructuralCategory::Classes => file.classes = Some(serde_json::to_value(&value)?),
        }
    }

    Ok(match cause {
        None => CallOutcome::Success(file),
        Some(cause) => CallOutcome::Fallback { value: file, cause },
    })
}

/// Decompose and enrich one structural file. A unit with no declarations
/// yields the default result without any call.
pub async fn extract(ctx: &RunContext, filename: &str, source: &str) -> Result<CallOutcome<FileResult>> {
    let unit = crate::analyzer::decompose(filename, source)?;
    let results = enrich_categories(ctx, filename, &unit).await?;
    merge(unit.imports, results)
}
