//! Pass-through enricher used when no enrichment backend is configured.

use async_trait::async_trait;
use std::convert::Infallible;

use crate::traits::PropertyEnricher;
use crate::types::PropertyRecord;

/// Returns the extracted fields unchanged as the enrichment payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEnricher;

#[async_trait]
impl PropertyEnricher for NoopEnricher {
    type Error = Infallible;

    async fn process_property_data(
        &self,
        record: &PropertyRecord,
    ) -> Result<serde_json::Value, Self::Error> {
        Ok(serde_json::json!({
            "title": record.fields.title,
            "price": record.fields.price,
            "address": record.fields.address,
        }))
    }
}
