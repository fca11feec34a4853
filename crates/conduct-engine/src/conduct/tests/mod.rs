mod common;

mod conversion;
mod rules;
