//! HTTP trigger surface.

pub mod rest;
