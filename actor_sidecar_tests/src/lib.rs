//! End-to-end tests: the driver talks to an in-process stand-in for the sidecar, which
//! forwards every invocation to a real callback listener.

pub mod fake_sidecar;

#[cfg(test)]
mod end_to_end;
#[cfg(test)]
mod listener_lifecycle;
