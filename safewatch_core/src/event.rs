use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::{Address, EventError, TxHash};

/// Decoded Safe contract events, tagged by event name.
///
/// Big integer amounts travel as decimal strings.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "args")]
pub enum SafeEvent {
    /// Emitted by the proxy factory when a new Safe proxy is deployed.
    ProxyCreation { proxy: Address, singleton: Address },

    #[serde(rename_all = "camelCase")]
    SafeSetup {
        initiator: Address,
        owners: Vec<Address>,
        threshold: u64,
        initializer: Address,
        fallback_handler: Address,
    },

    AddedOwner { owner: Address },

    RemovedOwner { owner: Address },

    ChangedThreshold { threshold: u64 },

    ChangedGuard { guard: Address },

    ChangedFallbackHandler { handler: Address },

    #[serde(rename_all = "camelCase")]
    ExecutionSuccess {
        tx_hash: TxHash,
        #[serde_as(as = "DisplayFromStr")]
        payment: u128,
    },

    /// Native currency sent to a Safe.
    NativeTransferIn {
        from: Address,
        to: Address,
        #[serde_as(as = "DisplayFromStr")]
        value: u128,
    },

    /// Native currency sent from a Safe.
    NativeTransferOut {
        from: Address,
        to: Address,
        #[serde_as(as = "DisplayFromStr")]
        value: u128,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    ProxyCreation,
    SafeSetup,
    AddedOwner,
    RemovedOwner,
    ChangedThreshold,
    ChangedGuard,
    ChangedFallbackHandler,
    ExecutionSuccess,
    NativeTransferIn,
    NativeTransferOut,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::ProxyCreation,
        EventKind::SafeSetup,
        EventKind::AddedOwner,
        EventKind::RemovedOwner,
        EventKind::ChangedThreshold,
        EventKind::ChangedGuard,
        EventKind::ChangedFallbackHandler,
        EventKind::ExecutionSuccess,
        EventKind::NativeTransferIn,
        EventKind::NativeTransferOut,
    ];
}

impl Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::ProxyCreation => "ProxyCreation",
            EventKind::SafeSetup => "SafeSetup",
            EventKind::AddedOwner => "AddedOwner",
            EventKind::RemovedOwner => "RemovedOwner",
            EventKind::ChangedThreshold => "ChangedThreshold",
            EventKind::ChangedGuard => "ChangedGuard",
            EventKind::ChangedFallbackHandler => "ChangedFallbackHandler",
            EventKind::ExecutionSuccess => "ExecutionSuccess",
            EventKind::NativeTransferIn => "NativeTransferIn",
            EventKind::NativeTransferOut => "NativeTransferOut",
        };
        write!(f, "{s}")
    }
}

impl SafeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SafeEvent::ProxyCreation { .. } => EventKind::ProxyCreation,
            SafeEvent::SafeSetup { .. } => EventKind::SafeSetup,
            SafeEvent::AddedOwner { .. } => EventKind::AddedOwner,
            SafeEvent::RemovedOwner { .. } => EventKind::RemovedOwner,
            SafeEvent::ChangedThreshold { .. } => EventKind::ChangedThreshold,
            SafeEvent::ChangedGuard { .. } => EventKind::ChangedGuard,
            SafeEvent::ChangedFallbackHandler { .. } => EventKind::ChangedFallbackHandler,
            SafeEvent::ExecutionSuccess { .. } => EventKind::ExecutionSuccess,
            SafeEvent::NativeTransferIn { .. } => EventKind::NativeTransferIn,
            SafeEvent::NativeTransferOut { .. } => EventKind::NativeTransferOut,
        }
    }
}

/// A decoded event together with the log it was read from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChainEvent {
    /// Contract that emitted the log.
    pub address: Address,
    pub block_number: u64,
    pub block_timestamp: i64,
    pub transaction_hash: TxHash,
    pub log_index: u64,
    pub event: SafeEvent,
}

impl ChainEvent {
    pub fn from_json(line: &str) -> Result<ChainEvent, EventError> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }

    /// Ordering key within a chain.
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }

    /// Fails if this event does not come strictly after `previous`.
    pub fn check_follows(&self, previous: (u64, u64)) -> Result<(), EventError> {
        if self.position() <= previous {
            return Err(EventError::OutOfOrder {
                kind: self.kind(),
                address: self.address.clone(),
                block_number: self.block_number,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETUP: &str = r#"{"address":"0x1111111111111111111111111111111111111111","blockNumber":23804500,"blockTimestamp":1762900000,"transactionHash":"0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa","logIndex":3,"event":{"type":"SafeSetup","args":{"initiator":"0x4e1DCf7AD4e460CfD30791CCC4F9c8a4f820ec67","owners":["0x2222222222222222222222222222222222222222","0x3333333333333333333333333333333333333333"],"threshold":2,"initializer":"0x4444444444444444444444444444444444444444","fallbackHandler":"0x5555555555555555555555555555555555555555"}}}"#;

    #[test]
    fn test_parse_setup() {
        let event = ChainEvent::from_json(SETUP).unwrap();
        assert_eq!(event.kind(), EventKind::SafeSetup);
        assert_eq!(event.position(), (23_804_500, 3));
        match event.event {
            SafeEvent::SafeSetup {
                owners, threshold, ..
            } => {
                assert_eq!(owners.len(), 2);
                assert_eq!(threshold, 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_parse_transfer_value_beyond_u64() {
        let line = r#"{"address":"0x1111111111111111111111111111111111111111","blockNumber":1,"blockTimestamp":1,"transactionHash":"0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb","logIndex":0,"event":{"type":"NativeTransferIn","args":{"from":"0x2222222222222222222222222222222222222222","to":"0x1111111111111111111111111111111111111111","value":"340282366920938463463374607431768211455"}}}"#;
        let event = ChainEvent::from_json(line).unwrap();
        assert_eq!(
            event.event,
            SafeEvent::NativeTransferIn {
                from: "0x2222222222222222222222222222222222222222".parse().unwrap(),
                to: "0x1111111111111111111111111111111111111111".parse().unwrap(),
                value: u128::MAX,
            }
        );
    }

    #[test]
    fn test_unknown_event_rejected() {
        let line = SETUP.replace("\"SafeSetup\"", "\"Approval\"");
        assert!(ChainEvent::from_json(&line).is_err());
    }

    #[test]
    fn test_check_follows() {
        let event = ChainEvent::from_json(SETUP).unwrap();
        assert!(event.check_follows((23_804_500, 2)).is_ok());
        assert!(event.check_follows((23_804_500, 3)).is_err());
        assert!(event.check_follows((23_804_501, 0)).is_err());
    }

    #[test]
    fn test_kind_display() {
        let names = EventKind::ALL.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(names[0], "ProxyCreation");
        assert_eq!(names[9], "NativeTransferOut");
    }
}
