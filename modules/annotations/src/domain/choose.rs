//! Selection algorithms behind `/choose/...`.
//!
//! Random selections count the population once and then issue `limit`
//! independent offset lookups concurrently. The first failing lookup fails the
//! whole selection and the remaining lookups are dropped.

use futures::future::try_join_all;
use rand::Rng;
use tracing::{debug, instrument};

use crate::contract::model::{Choice, Scope};
use crate::domain::error::DomainError;
use crate::domain::service::{storage, Service};

/// `limit` uniform offsets in `[0, population)`.
fn draw_offsets(population: u64, limit: u64) -> Vec<u64> {
    let mut rng = rand::rng();
    (0..limit).map(|_| rng.random_range(0..population)).collect()
}

impl Service {
    #[instrument(name = "annotations.service.random_images", skip(self, scope))]
    pub async fn random_images(&self, scope: &Scope, limit: u64) -> Result<Vec<Choice>, DomainError> {
        if scope.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let population = self.selection.count_images(scope).await.map_err(storage)?;
        if population == 0 {
            debug!("No images to choose from");
            return Ok(Vec::new());
        }

        let draws = draw_offsets(population, limit)
            .into_iter()
            .map(|offset| self.selection.image_at(scope, offset));
        let picked = try_join_all(draws).await.map_err(storage)?;

        // An offset can fall past the end if images vanish between count and draw.
        Ok(picked.into_iter().flatten().map(Choice::image).collect())
    }

    #[instrument(name = "annotations.service.random_tag_pairs", skip(self, scope))]
    pub async fn random_tag_pairs(&self, scope: &Scope, limit: u64) -> Result<Vec<Choice>, DomainError> {
        if scope.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let population = self.selection.count_tag_pairs(scope).await.map_err(storage)?;
        if population == 0 {
            debug!("No tagged images to choose from");
            return Ok(Vec::new());
        }

        let draws = draw_offsets(population, limit)
            .into_iter()
            .map(|offset| self.selection.tag_pair_at(scope, offset));
        let picked = try_join_all(draws).await.map_err(storage)?;

        Ok(picked
            .into_iter()
            .flatten()
            .map(|(image, tag)| Choice::pair(image, tag))
            .collect())
    }

    #[instrument(name = "annotations.service.least_used_images", skip(self, scope))]
    pub async fn least_used_images(&self, scope: &Scope, limit: u64) -> Result<Vec<Choice>, DomainError> {
        if scope.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        self.selection
            .least_used_images(scope, limit)
            .await
            .map_err(storage)
    }

    /// Least used pairs first, or most used first when `most_used` is set.
    #[instrument(name = "annotations.service.ranked_tag_pairs", skip(self, scope))]
    pub async fn ranked_tag_pairs(
        &self,
        scope: &Scope,
        limit: u64,
        most_used: bool,
    ) -> Result<Vec<Choice>, DomainError> {
        if scope.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        self.selection
            .ranked_tag_pairs(scope, limit, most_used)
            .await
            .map_err(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_stay_within_population() {
        let offsets = draw_offsets(3, 200);
        assert_eq!(offsets.len(), 200);
        assert!(offsets.iter().all(|o| *o < 3));
    }

    #[test]
    fn single_item_population_always_draws_zero() {
        assert!(draw_offsets(1, 10).iter().all(|o| *o == 0));
    }
}
