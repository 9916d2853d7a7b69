/*!
# NASH NN

Minimal dense-network toolkit used by the NASH validator's scoring models and
the reference miner. Networks are evaluated one sample at a time on `f32`
vectors; there is no batching and no device abstraction.

## Module Structure

- **layers**: `Linear`, `LayerNorm` and scalar activations
- **sequential**: layer stacks, training tape, backpropagation
- **optim**: Adam optimiser
- **loss**: mean squared error
- **error**: NN-specific errors

Inference (`Sequential::forward`) never mutates the network, so a shared
reference is enough to evaluate a model while training happens elsewhere on
an exclusively owned copy.
*/

pub mod error;
pub mod layers;
pub mod loss;
pub mod optim;
pub mod sequential;

pub use error::{NnError, Result};
pub use layers::{relu, sigmoid, LayerNorm, Linear};
pub use loss::mse_loss;
pub use optim::{Adam, AdamConfig};
pub use sequential::{Gradients, Layer, Sequential, SequentialBuilder, Tape};
