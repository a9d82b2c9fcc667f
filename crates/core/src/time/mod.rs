pub mod b3_market;
