use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use futures_util::StreamExt;
use serde::Serialize;
use sha2::{Digest, Sha256};

use scheme_core::{Header, HeaderMap, Request};
use scheme_host::{HostConfig, ResponderBody, ResponderRegistry, ResumeTrigger};

#[derive(Debug, Clone)]
pub struct FetchArgs {
    pub url: String,
    pub method: String,
    pub headers: Vec<String>,
    pub data: Option<String>,
    pub chunk_size: usize,
    pub config: Option<PathBuf>,
    pub resume_interval: u64,
    pub out: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct FetchReport {
    pub url: String,
    pub status: u16,
    pub mime_type: String,
    pub length: u64,
    pub bytes: u64,
    pub pending: u64,
    pub resumes: u64,
    pub sha256: String,
}

pub async fn fetch(args: FetchArgs, format: &str) -> anyhow::Result<()> {
    let out = args.out.clone();
    let (report, body) = run(args).await?;

    if let Some(out) = &out {
        std::fs::write(out, &body).with_context(|| format!("failed to write {}", out.display()))?;
    }

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!("✓ {} ({} {})", report.url, report.status, report.mime_type);
            println!("  Length:  {}", report.length);
            println!("  Bytes:   {}", report.bytes);
            println!("  Pending: {} ({} resumed)", report.pending, report.resumes);
            println!("  SHA256:  {}", report.sha256);
            if let Some(out) = &out {
                println!("  Output:  {}", out.display());
            }
        }
    }

    Ok(())
}

/// Drive the request to completion and return the report and the body.
pub async fn run(args: FetchArgs) -> anyhow::Result<(FetchReport, Vec<u8>)> {
    let config = match &args.config {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };
    let request = build_request(&args)?;

    let registry = Arc::new(ResponderRegistry::from_config(&config));
    let Some(responder) = registry.create_for(&request) else {
        bail!(
            "{} is not served here (registered scheme: {})",
            request.url(),
            registry.registration().name
        );
    };

    let Some((metadata, mut body)) = ResponderBody::open(responder, &request, args.chunk_size)
        .with_context(|| format!("failed to open {}", request.url()))?
    else {
        bail!("no content for {}", request.url());
    };
    tracing::debug!(url = request.url(), length = metadata.length, "response opened");

    let trigger = ResumeTrigger::spawn(
        Arc::clone(&registry),
        Duration::from_millis(args.resume_interval),
    );

    let mut received = Vec::new();
    let mut failure = None;
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(chunk) => received.extend_from_slice(&chunk),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    let pending = body.pending_count();
    drop(body);
    let resumes = trigger.shutdown().await;

    if let Some(e) = failure {
        return Err(e).with_context(|| format!("transfer of {} failed", request.url()));
    }
    if received.len() as u64 != metadata.length {
        tracing::warn!(
            url = request.url(),
            expected = metadata.length,
            received = received.len(),
            "body length differs from published length"
        );
    }

    let report = FetchReport {
        url: request.url().to_string(),
        status: metadata.status,
        mime_type: metadata.mime_type,
        length: metadata.length,
        bytes: received.len() as u64,
        pending,
        resumes,
        sha256: hex::encode(Sha256::digest(&received)),
    };
    Ok((report, received))
}

fn build_request(args: &FetchArgs) -> anyhow::Result<Request> {
    let headers = args
        .headers
        .iter()
        .map(|line| {
            Header::parse(line).with_context(|| format!("invalid header {line:?}, expected \"Name: value\""))
        })
        .collect::<anyhow::Result<HeaderMap>>()?;
    let body = args.data.clone().map(String::into_bytes);
    Ok(Request::new(args.method.as_str(), args.url.as_str(), headers, body))
}
