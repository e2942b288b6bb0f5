use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::domain::phone_number::{AllocatedResource, Candidate, ProvisioningRequest};
use crate::errors::AllocationExhausted;
use crate::provisioning::hints::extract_hints;
use crate::provisioning::Provisioner;

/// Ordered candidates that may grow while being walked. Values are unique by
/// `Candidate::dedup_key`.
#[derive(Clone, Debug, Default)]
pub struct Worklist {
    items: Vec<Candidate>,
    seen: HashSet<String>,
}

impl Worklist {
    /// Starts from `seeds`, or from `fallback` when no seeds were given.
    pub fn seeded(seeds: &[Candidate], fallback: &[Candidate]) -> Self {
        let mut worklist = Self::default();
        let initial = if seeds.is_empty() { fallback } else { seeds };
        worklist.extend(initial.iter().cloned());
        worklist
    }

    /// Appends `candidate` unless an equivalent value is already queued or
    /// was already tried.
    pub fn push(&mut self, candidate: Candidate) -> bool {
        if candidate.as_str().is_empty() || !self.seen.insert(candidate.dedup_key()) {
            return false;
        }
        self.items.push(candidate);
        true
    }

    pub fn extend(&mut self, candidates: impl IntoIterator<Item = Candidate>) -> usize {
        let mut added = 0;
        for candidate in candidates {
            if self.push(candidate) {
                added += 1;
            }
        }
        added
    }

    pub fn get(&self, index: usize) -> Option<&Candidate> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Candidate] {
        &self.items
    }
}

impl Provisioner {
    /// Tries candidates in order until one create call succeeds. Rejections
    /// extend the worklist with the alternatives they mention; transport
    /// failures only move on to the next candidate.
    pub async fn allocate(
        &self,
        request: &ProvisioningRequest,
        seed_candidates: &[Candidate],
    ) -> Result<AllocatedResource, AllocationExhausted> {
        self.allocate_until_stopped(request, seed_candidates, &AtomicBool::new(false)).await
    }

    /// Same walk as `allocate`, but once `stop` is set no further candidate is
    /// tried. A create already sent is always awaited so its id is never lost.
    pub(crate) async fn allocate_until_stopped(
        &self,
        request: &ProvisioningRequest,
        seed_candidates: &[Candidate],
        stop: &AtomicBool,
    ) -> Result<AllocatedResource, AllocationExhausted> {
        let mut worklist = Worklist::seeded(seed_candidates, &self.policy.fallback_candidates);
        let mut index = 0;
        let mut rejections = 0;
        let mut last_error = None;

        while let Some(candidate) = worklist.get(index).cloned() {
            if stop.load(Ordering::Acquire) {
                info!(
                    event_name = "provisioning.allocate.stopped",
                    correlation_id = %request.correlation_id(),
                    attempts = index,
                    remaining = worklist.len() - index,
                    "allocation stopped before trying the next candidate"
                );
                break;
            }
            index += 1;

            match self.api.create_resource(request, &candidate).await {
                Ok(resource) => {
                    info!(
                        event_name = "provisioning.allocate.created",
                        correlation_id = %request.correlation_id(),
                        candidate = %candidate,
                        attempt = index,
                        resource_id = %resource.id,
                        "phone number allocated"
                    );
                    return Ok(resource);
                }
                Err(error) => {
                    match error.rejection_body() {
                        Some(body) => {
                            rejections += 1;
                            let hints_added = worklist.extend(extract_hints(body));
                            warn!(
                                event_name = "provisioning.allocate.rejected",
                                correlation_id = %request.correlation_id(),
                                candidate = %candidate,
                                attempt = index,
                                hints_added,
                                remaining = worklist.len() - index,
                                error = %error,
                                "upstream rejected candidate"
                            );
                        }
                        None => {
                            warn!(
                                event_name = "provisioning.allocate.transport_failed",
                                correlation_id = %request.correlation_id(),
                                candidate = %candidate,
                                attempt = index,
                                remaining = worklist.len() - index,
                                error = %error,
                                "create call failed before the upstream answered"
                            );
                        }
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(AllocationExhausted { attempts: index, rejections, last_error })
    }
}

#[cfg(test)]
mod tests {
    use super::Worklist;
    use crate::domain::phone_number::Candidate;

    fn candidates(values: &[&str]) -> Vec<Candidate> {
        values.iter().map(|value| Candidate::new(*value)).collect()
    }

    #[test]
    fn falls_back_only_when_seeds_are_empty() {
        let fallback = candidates(&["415", "510"]);

        let seeded = Worklist::seeded(&candidates(&["212"]), &fallback);
        assert_eq!(seeded.as_slice(), candidates(&["212"]).as_slice());

        let defaulted = Worklist::seeded(&[], &fallback);
        assert_eq!(defaulted.as_slice(), fallback.as_slice());
    }

    #[test]
    fn collapses_duplicate_seeds() {
        let worklist = Worklist::seeded(&candidates(&["510", "518", " 510"]), &[]);
        assert_eq!(worklist.as_slice(), candidates(&["510", "518"]).as_slice());
    }

    #[test]
    fn never_appends_a_value_twice() {
        let mut worklist = Worklist::seeded(&candidates(&["510"]), &[]);

        assert_eq!(worklist.extend(candidates(&["518", "904"])), 2);
        assert_eq!(worklist.extend(candidates(&["904", "510", "305"])), 1);
        assert!(!worklist.push(Candidate::new("")));
        assert_eq!(worklist.as_slice(), candidates(&["510", "518", "904", "305"]).as_slice());
    }

    #[test]
    fn empty_seeds_and_fallback_make_an_empty_worklist() {
        let worklist = Worklist::seeded(&[], &[]);
        assert!(worklist.is_empty());
        assert_eq!(worklist.len(), 0);
        assert!(worklist.get(0).is_none());
    }
}
