//! Cross-subsystem integration flows.

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod comparison;
#[cfg(test)]
mod lifecycle;
#[cfg(test)]
mod settlement;
