//! Operator trait shared by the aggregate and join operators.

use rowstep_core::context::Context;
use rowstep_core::error::Result;
use rowstep_core::schema::FrameDescription;
use rowstep_core::types::Row;
use rowstep_expr::Evaluator;
use rowstep_io::InMemoryBuffer;

/// An operator over fully materialized inputs.
///
/// `plan` must be side-effect free and must fail with `Error::Config` for
/// definitions that cannot run; `eval` is only called after a successful
/// `plan` on the same input shapes.
pub trait Operator: Send + Sync {
    /// Stable operator name, used in logs.
    fn name(&self) -> &'static str;

    /// Output description for the given input descriptions.
    fn plan(&self, inputs: &[FrameDescription], evaluator: &dyn Evaluator) -> Result<FrameDescription>;

    /// Evaluate the operator. Unary operators read `inputs[0]`; binary ones
    /// read `inputs[0]` and `inputs[1]`.
    fn eval(
        &self,
        ctx: &Context,
        inputs: Vec<InMemoryBuffer>,
        evaluator: &dyn Evaluator,
    ) -> Result<Vec<Row>>;
}
