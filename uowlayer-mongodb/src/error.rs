//! Mapping of driver errors onto [`UnitOfWorkError`].
//!
//! The kind of failure is preserved: transactions rejected by the deployment
//! become [`UnitOfWorkError::NotSupported`], duplicate keys become
//! [`UnitOfWorkError::DocumentAlreadyExists`], everything else is a backend
//! error carrying the driver's message.

use mongodb::error::{Error as DriverError, ErrorKind, WriteFailure};

use uowlayer_core::error::UnitOfWorkError;

/// `IllegalOperation`: returned by standalone servers for transaction numbers.
pub(crate) const ILLEGAL_OPERATION: i32 = 20;

/// `NamespaceExists`: the collection was created concurrently.
pub(crate) const NAMESPACE_EXISTS: i32 = 48;

/// `DuplicateKey`.
pub(crate) const DUPLICATE_KEY: i32 = 11000;

/// What a driver error means to the unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Failure {
    TransactionsUnsupported,
    DuplicateKey,
    Other,
}

/// Classifies a failure from the server's error code and the driver's message.
pub(crate) fn classify(code: Option<i32>, message: &str) -> Failure {
    match code {
        Some(ILLEGAL_OPERATION) => Failure::TransactionsUnsupported,
        Some(DUPLICATE_KEY) => Failure::DuplicateKey,
        _ if message.contains("Transactions are not supported") => Failure::TransactionsUnsupported,
        _ if message.contains("only allowed on a replica set member or mongos") => {
            Failure::TransactionsUnsupported
        }
        _ => Failure::Other,
    }
}

/// The server error code carried by `error`, if any.
pub(crate) fn error_code(error: &DriverError) -> Option<i32> {
    match error.kind.as_ref() {
        ErrorKind::Command(command_error) => Some(command_error.code),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => Some(write_error.code),
        ErrorKind::Write(WriteFailure::WriteConcernError(concern_error)) => Some(concern_error.code),
        ErrorKind::InsertMany(insert_error) => insert_error
            .write_errors
            .as_ref()
            .and_then(|errors| errors.first())
            .map(|error| error.code),
        _ => None,
    }
}

/// The duplicated key value reported by the server.
///
/// The driver does not surface the write error's `keyValue`, so the value is
/// read from the `dup key: { _id: 1 }` suffix of the message. Compound keys
/// keep their `field: value` pairs.
pub(crate) fn duplicate_key(message: &str) -> Option<String> {
    let (_, tail) = message.split_once("dup key: {")?;
    let body = tail.rsplit_once('}').map_or(tail, |(body, _)| body).trim();

    match body.split_once(": ") {
        Some((_, value)) if !value.contains(": ") => Some(value.trim().to_string()),
        _ if body.is_empty() => None,
        _ => Some(body.to_string()),
    }
}

fn to_unit_of_work_error(error: &DriverError, collection: Option<&str>) -> UnitOfWorkError {
    let message = error.to_string();

    if let ErrorKind::InvalidArgument { message, .. } = error.kind.as_ref() {
        return UnitOfWorkError::InvalidArgument(message.clone());
    }

    match classify(error_code(error), &message) {
        Failure::TransactionsUnsupported => UnitOfWorkError::NotSupported(message),
        Failure::DuplicateKey => UnitOfWorkError::DocumentAlreadyExists(
            duplicate_key(&message).unwrap_or(message),
            collection.unwrap_or_default().to_string(),
        ),
        Failure::Other => UnitOfWorkError::Backend(message),
    }
}

/// Maps a driver error raised outside of a specific collection.
pub(crate) fn driver_error(error: DriverError) -> UnitOfWorkError {
    to_unit_of_work_error(&error, None)
}

/// Maps a driver error raised by an operation on `collection`.
pub(crate) fn collection_error(collection: &str) -> impl Fn(DriverError) -> UnitOfWorkError + '_ {
    move |error| to_unit_of_work_error(&error, Some(collection))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_transaction_errors_are_not_supported() {
        assert_eq!(
            classify(None, "Transactions are not supported by this deployment"),
            Failure::TransactionsUnsupported
        );
        assert_eq!(
            classify(
                Some(ILLEGAL_OPERATION),
                "Transaction numbers are only allowed on a replica set member or mongos"
            ),
            Failure::TransactionsUnsupported
        );
    }

    #[test]
    fn duplicate_keys_are_detected_by_code() {
        assert_eq!(classify(Some(DUPLICATE_KEY), "E11000 duplicate key error"), Failure::DuplicateKey);
    }

    #[test]
    fn duplicate_key_value_is_read_from_the_message() {
        let message = "Error code 11000 (DuplicateKey): E11000 duplicate key error collection: \
            shop.invoice index: _id_ dup key: { _id: 1 }";
        assert_eq!(duplicate_key(message).as_deref(), Some("1"));

        let message = "E11000 duplicate key error collection: shop.order index: _id_ dup key: { _id: \"a-1\" }";
        assert_eq!(duplicate_key(message).as_deref(), Some("\"a-1\""));

        let message = "E11000 duplicate key error index: sku_1_site_1 dup key: { sku: 7, site: 2 }";
        assert_eq!(duplicate_key(message).as_deref(), Some("sku: 7, site: 2"));

        assert_eq!(duplicate_key("E11000 duplicate key error"), None);
    }

    #[test]
    fn anything_else_is_a_backend_failure() {
        assert_eq!(classify(Some(13), "unauthorized"), Failure::Other);
        assert_eq!(classify(None, "connection refused"), Failure::Other);
    }
}
