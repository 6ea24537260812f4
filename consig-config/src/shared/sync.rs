use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Per entity kind settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityConfig {
    /// Maximum number of rows of this kind upserted concurrently.
    pub max_concurrency: u16,
}

impl EntityConfig {
    pub const fn new(max_concurrency: u16) -> Self {
        Self { max_concurrency }
    }
}

/// Settings of a sync run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    #[serde(default = "default_members")]
    pub members: EntityConfig,
    #[serde(default = "default_sales")]
    pub sales: EntityConfig,
    #[serde(default = "default_installments")]
    pub installments: EntityConfig,
    /// When set, only source rows changed in the last `n` hours are extracted. A full
    /// extraction is done otherwise.
    #[serde(default)]
    pub changed_since_hours: Option<u64>,
}

impl SyncConfig {
    pub const DEFAULT_MEMBERS_CONCURRENCY: u16 = 5;
    pub const DEFAULT_SALES_CONCURRENCY: u16 = 10;
    pub const DEFAULT_INSTALLMENTS_CONCURRENCY: u16 = 20;

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (kind, entity) in [
            ("members", &self.members),
            ("sales", &self.sales),
            ("installments", &self.installments),
        ] {
            if entity.max_concurrency == 0 {
                return Err(ValidationError::MaxConcurrencyZero { kind });
            }
        }

        if self.changed_since_hours == Some(0) {
            return Err(ValidationError::ChangedSinceHoursZero);
        }

        Ok(())
    }

    /// Number of destination connections needed to serve every kind at full concurrency.
    pub fn destination_pool_size(&self) -> u32 {
        // One connection on top of the caps for lookups made outside the fan-out.
        self.members.max_concurrency as u32
            + self.sales.max_concurrency as u32
            + self.installments.max_concurrency as u32
            + 1
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            members: default_members(),
            sales: default_sales(),
            installments: default_installments(),
            changed_since_hours: None,
        }
    }
}

fn default_members() -> EntityConfig {
    EntityConfig::new(SyncConfig::DEFAULT_MEMBERS_CONCURRENCY)
}

fn default_sales() -> EntityConfig {
    EntityConfig::new(SyncConfig::DEFAULT_SALES_CONCURRENCY)
}

fn default_installments() -> EntityConfig {
    EntityConfig::new(SyncConfig::DEFAULT_INSTALLMENTS_CONCURRENCY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_sections() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"installments": {"max_concurrency": 50}}"#).unwrap();

        assert_eq!(config.members, EntityConfig::new(5));
        assert_eq!(config.sales, EntityConfig::new(10));
        assert_eq!(config.installments, EntityConfig::new(50));
        assert_eq!(config.changed_since_hours, None);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = SyncConfig {
            sales: EntityConfig::new(0),
            ..SyncConfig::default()
        };

        assert_eq!(
            config.validate(),
            Err(ValidationError::MaxConcurrencyZero { kind: "sales" })
        );
    }

    #[test]
    fn zero_lookback_is_rejected() {
        let config = SyncConfig {
            changed_since_hours: Some(0),
            ..SyncConfig::default()
        };

        assert_eq!(
            config.validate(),
            Err(ValidationError::ChangedSinceHoursZero)
        );
    }

    #[test]
    fn pool_covers_all_caps() {
        assert_eq!(SyncConfig::default().destination_pool_size(), 36);
    }
}
