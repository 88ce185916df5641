extern crate pest;
#[macro_use]
extern crate pest_derive;
pub mod deck_error;
pub mod table_error;
pub(crate) mod parsing;
pub mod keyword_specs;
pub mod deck;
pub mod records;
pub mod dataframes;
pub mod inferdims;
pub mod mapper;
pub mod writer;
pub mod equil;
pub mod pvt;
pub mod satfunc;
pub mod wcon;
pub mod vfp;
pub mod csv;
pub mod files;
