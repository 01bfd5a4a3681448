//! The probe seam between samplers and the things they observe.

use async_trait::async_trait;
use disruptwatch_types::Condition;

/// A check that a [`Sampler`](crate::Sampler) runs once per interval.
///
/// The probe receives whether the previous sample was up and returns the
/// condition to record for this sample (if any) and whether the target is up
/// now. A probe is expected to return a condition only on a transition; the
/// sampler records whatever it is given.
///
/// Implementations must bound their own running time (for example with a
/// request timeout). A stalled probe delays only the sampler that owns it.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use disruptwatch_sdk::Probe;
/// use disruptwatch_types::Condition;
///
/// struct AlwaysUp;
///
/// #[async_trait]
/// impl Probe for AlwaysUp {
///     async fn probe(&mut self, previous_up: bool) -> (Option<Condition>, bool) {
///         let condition = (!previous_up).then(|| Condition::info("disruption/demo", "recovered"));
///         (condition, true)
///     }
/// }
/// ```
#[async_trait]
pub trait Probe: Send {
    async fn probe(&mut self, previous_up: bool) -> (Option<Condition>, bool);
}

#[async_trait]
impl<P: Probe + ?Sized> Probe for Box<P> {
    async fn probe(&mut self, previous_up: bool) -> (Option<Condition>, bool) {
        (**self).probe(previous_up).await
    }
}
