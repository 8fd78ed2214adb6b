pub mod contract;
pub mod event;
pub mod source;
pub mod ticket;
pub mod time;

pub use contract::{ContractRecord, ContractStatus, contract_timeline};
pub use event::{Event, EventId, EventKind, Interval, Metadata, display_value};
pub use source::{Source, SourceItem};
pub use ticket::{TicketRecord, TicketTimelineOptions, ticket_timeline};
pub use time::{TimestampError, format_timestamp, parse_timestamp};
