//! Seam traits connecting the engine to the outside world.

mod feed;
mod gateway;
mod store;

pub use feed::PriceFeed;
pub use gateway::{
    BrokerGateway, BrokerPosition, FillReport, OptionContract, OrderAck, OrderUpdate, Quote,
};
pub use store::{MemoryStore, RecordStore};
