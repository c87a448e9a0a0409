//! Driver sessions behind the [`ClientSession`] trait.

use async_trait::async_trait;
use mongodb::{
    ClientSession as DriverSession,
    options::{
        ReadConcern, ReadPreference, SelectionCriteria, TransactionOptions as DriverTransactionOptions,
        WriteConcern,
    },
};
use std::fmt;

use uowlayer_core::{
    backend::ClientSession,
    error::UnitOfWorkResult,
    transaction::{ReadConcernLevel, ReadPreferenceMode, TransactionOptions, WriteConcernLevel},
};

use crate::error::driver_error;

/// A server session, usable by repositories of any document type.
pub struct MongoSession {
    inner: DriverSession,
    in_transaction: bool,
}

impl fmt::Debug for MongoSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoSession")
            .field("id", &self.inner.id())
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

impl MongoSession {
    pub(crate) fn new(inner: DriverSession) -> Self {
        Self {
            inner,
            in_transaction: false,
        }
    }

    /// The underlying driver session, for operations outside the repository API.
    pub fn inner_mut(&mut self) -> &mut DriverSession {
        &mut self.inner
    }
}

#[async_trait]
impl ClientSession for MongoSession {
    fn id(&self) -> String {
        self.inner.id().to_string()
    }

    async fn start_transaction(&mut self, options: &TransactionOptions) -> UnitOfWorkResult<()> {
        self.inner
            .start_transaction()
            .with_options(driver_transaction_options(options))
            .await
            .map_err(driver_error)?;
        self.in_transaction = true;

        Ok(())
    }

    async fn commit_transaction(&mut self) -> UnitOfWorkResult<()> {
        self.inner.commit_transaction().await.map_err(driver_error)?;
        self.in_transaction = false;

        Ok(())
    }

    async fn abort_transaction(&mut self) -> UnitOfWorkResult<()> {
        // The server discards the transaction even when the abort command fails.
        self.in_transaction = false;
        self.inner.abort_transaction().await.map_err(driver_error)
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

fn read_preference(mode: ReadPreferenceMode) -> ReadPreference {
    match mode {
        ReadPreferenceMode::Primary => ReadPreference::Primary,
        ReadPreferenceMode::PrimaryPreferred => ReadPreference::PrimaryPreferred {
            options: Default::default(),
        },
        ReadPreferenceMode::Secondary => ReadPreference::Secondary {
            options: Default::default(),
        },
        ReadPreferenceMode::SecondaryPreferred => ReadPreference::SecondaryPreferred {
            options: Default::default(),
        },
        ReadPreferenceMode::Nearest => ReadPreference::Nearest {
            options: Default::default(),
        },
    }
}

fn read_concern(level: ReadConcernLevel) -> ReadConcern {
    match level {
        ReadConcernLevel::Local => ReadConcern::local(),
        ReadConcernLevel::Majority => ReadConcern::majority(),
        ReadConcernLevel::Snapshot => ReadConcern::snapshot(),
        ReadConcernLevel::Available => ReadConcern::available(),
        ReadConcernLevel::Linearizable => ReadConcern::linearizable(),
    }
}

fn write_concern(level: WriteConcernLevel) -> WriteConcern {
    match level {
        WriteConcernLevel::Majority => WriteConcern::majority(),
        WriteConcernLevel::Nodes(nodes) => WriteConcern::nodes(nodes),
    }
}

pub(crate) fn driver_transaction_options(options: &TransactionOptions) -> DriverTransactionOptions {
    let mut driver_options = DriverTransactionOptions::default();
    driver_options.selection_criteria = Some(SelectionCriteria::ReadPreference(read_preference(
        options.read_preference,
    )));
    driver_options.read_concern = Some(read_concern(options.read_concern));
    driver_options.write_concern = Some(write_concern(options.write_concern));
    driver_options.max_commit_time = options.max_commit_time;

    driver_options
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_profile_is_primary_snapshot_majority() {
        let options = driver_transaction_options(&TransactionOptions::default());

        assert!(matches!(
            options.selection_criteria,
            Some(SelectionCriteria::ReadPreference(ReadPreference::Primary))
        ));
        assert_eq!(options.read_concern, Some(ReadConcern::snapshot()));
        assert_eq!(options.write_concern, Some(WriteConcern::majority()));
        assert_eq!(options.max_commit_time, None);
    }

    #[test]
    fn caller_options_are_carried_over() {
        let options = driver_transaction_options(
            &TransactionOptions::new()
                .with_read_preference(ReadPreferenceMode::Nearest)
                .with_read_concern(ReadConcernLevel::Majority)
                .with_write_concern(WriteConcernLevel::Nodes(2))
                .with_max_commit_time(Duration::from_secs(3)),
        );

        assert!(matches!(
            options.selection_criteria,
            Some(SelectionCriteria::ReadPreference(ReadPreference::Nearest { .. }))
        ));
        assert_eq!(options.read_concern, Some(ReadConcern::majority()));
        assert_eq!(options.write_concern, Some(WriteConcern::nodes(2)));
        assert_eq!(options.max_commit_time, Some(Duration::from_secs(3)));
    }
}
