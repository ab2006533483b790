// Library root
// -----------
// This crate exposes the upload pipeline as a small library surface; the
// binary (`main.rs`) wires it to the runner environment.
//
// Module responsibilities:
// - `config`: run configuration built once from the pipeline inputs.
// - `payload`: resolve a file or directory into the bytes to upload.
// - `artifact`: fetch a previously published artifact as the payload.
// - `api`: the blocking HTTP client (upload encodings + status polls).
// - `status`: the result decision table and the bounded polling loop.
// - `outputs`: the runner's named-output convention.
// - `run`: the sequential pipeline gluing the stages together.
// - `error`: the error kinds everything above reports.
//
// Keeping the stages as separate modules lets the polling loop and the
// upload encodings be tested in isolation from the runner environment.

pub mod api;
pub mod artifact;
pub mod config;
pub mod error;
pub mod outputs;
pub mod payload;
pub mod run;
pub mod status;
