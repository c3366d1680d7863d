// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::{HashMap, HashSet};

use saber_galaxy::GalaxyError;

use crate::config::Endpoint;
use crate::remote::ExecutionService;

/// Jobs whose outputs already carry their endpoint tag, by endpoint.
pub type TagLedger = HashMap<Endpoint, HashSet<String>>;

/// Tags job outputs in one history.
///
/// Tags are for auditing only: a failure is logged and otherwise ignored.
#[derive(Debug)]
pub struct Tagger<'a, S: ?Sized> {
    service: &'a S,
    history_id: &'a str,
    ledger: &'a mut TagLedger,
}

impl<'a, S: ExecutionService + ?Sized> Tagger<'a, S> {
    /// Creates a tagger recording endpoint tags in `ledger`.
    pub fn new(service: &'a S, history_id: &'a str, ledger: &'a mut TagLedger) -> Self {
        Self {
            service,
            history_id,
            ledger,
        }
    }

    /// The remote service.
    pub fn service(&self) -> &'a S {
        self.service
    }

    /// Tags the outputs of a job with the endpoint label and an optional marker.
    ///
    /// Without a marker a job is tagged at most once per endpoint. Returns
    /// whether tags were written.
    pub async fn tag(&mut self, endpoint: &Endpoint, job_id: &str, marker: Option<&str>) -> bool {
        if marker.is_none()
            && !self
                .ledger
                .entry(endpoint.clone())
                .or_default()
                .insert(job_id.to_string())
        {
            return false;
        }

        let mut tags = vec![endpoint.label().to_string()];
        tags.extend(marker.map(str::to_string));
        match self.write(job_id, &tags).await {
            Ok(()) => {
                tracing::info!(job = job_id, ?tags, "added tags to job outputs");
                true
            }
            Err(e) => {
                tracing::warn!(job = job_id, error = %e, "failed to tag job outputs");
                false
            }
        }
    }

    async fn write(&self, job_id: &str, tags: &[String]) -> Result<(), GalaxyError> {
        for output in self.service.job_outputs(job_id).await? {
            self.service
                .tag_dataset(self.history_id, &output.dataset.id, tags)
                .await?;
        }
        Ok(())
    }
}
