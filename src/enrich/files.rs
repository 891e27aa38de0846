//! Flat passes over the files at the project root.

use futures::future::join_all;
use tracing::{error, warn};

use super::RunContext;
use super::content::{FileRole, enrich_file};
use crate::ai::{CompletionRequest, InstructionId};
use crate::types::{EnrichError, FileResult, LeafFile, ModuleResult, NodeEnrichment, Result};

/// `files` pass: classify each root file from its metadata alone
pub async fn classify_root_files(ctx: &RunContext, files: &mut [LeafFile]) -> Result<()> {
    let calls = files.iter_mut().map(|leaf| async move {
        let request = CompletionRequest::new(InstructionId::RootFile)
            .var("file_extension", leaf.file_extension.clone())
            .var("filename", leaf.filename.clone())
            .var("num_lines", leaf.num_lines);

        let enrichment = match ctx
            .policy
            .call::<ModuleResult>(
                ctx.client.as_ref(),
                request,
                ctx.budget.request_max_units,
                &ctx.usage,
            )
            .await
        {
            Ok(outcome) => outcome.into_enrichment(),
            Err(e) => {
                warn!(filename = %leaf.filename, error = %e, "Root file classification failed");
                NodeEnrichment::fallback(ModuleResult::default(), e.to_string())
            }
        };
        leaf.analysis = Some(enrichment);
    });

    join_all(calls).await;
    Ok(())
}

/// `files-extended` pass: read each supported root file and summarize it
/// with the technologies found by the `files` pass
pub async fn describe_root_files(ctx: &RunContext, files: &mut [LeafFile]) -> Result<()> {
    let calls = files.iter_mut().map(|leaf| async move {
        if !ctx.support.is_supported(&leaf.filename) {
            leaf.content = Some(NodeEnrichment::not_applicable("unsupported file type"));
            return Ok(());
        }

        let technologies = leaf.technologies();
        let role = FileRole::Root {
            technologies: &technologies,
        };
        let enrichment = match enrich_file(ctx, &leaf.current_folder, &leaf.filename, role).await {
            Ok(outcome) => outcome.into_enrichment(),
            Err(e) if e.is_fatal() => return Err((leaf.filename.clone(), e)),
            Err(e) => {
                warn!(filename = %leaf.filename, error = %e, "Root file enrichment failed");
                NodeEnrichment::fallback(FileResult::default(), e.to_string())
            }
        };
        leaf.content = Some(enrichment);
        Ok(())
    });

    let mut fatal: Option<EnrichError> = None;
    for result in join_all(calls).await {
        if let Err((filename, e)) = result {
            error!(filename = %filename, error = %e, "Root file aborted");
            fatal.get_or_insert(e);
        }
    }

    match fatal {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
