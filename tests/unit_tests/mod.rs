mod assembly;
mod error;
mod geometry;
mod grid;
mod handler;
mod knot_insertion;
mod sum_factorization;
