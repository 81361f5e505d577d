pub mod cache;
pub mod collections;
pub mod combined;
pub mod config;
pub mod error;
pub mod nonstandard;
pub mod persistent;
pub mod preset;
pub mod traits;

pub mod phase0 {
    pub mod beacon_state;
    pub mod consts;
    pub mod containers;
    pub mod primitives;
}

pub mod altair {
    pub mod beacon_state;
    pub mod consts;
    pub mod containers;
    pub mod primitives;
}

pub mod bellatrix {
    pub mod beacon_state;
    pub mod containers;
    pub mod primitives;
}

pub mod capella {
    pub mod beacon_state;
    pub mod consts;
    pub mod containers;
    pub mod primitives;
}

pub mod deneb {
    pub mod beacon_state;
    pub mod consts;
    pub mod containers;
    pub mod primitives;
}

mod serde_utils;
