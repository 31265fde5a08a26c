/*!
# Inventory DevKit - Mocks et utilitaires de test

Bibliothèque facilitant les tests du kernel d'inventaire avec:
- Connecteur châssis scripté (sain, lent, transitoire, panne, blocage, panic)
- Fixtures JSON au format vendor
- Harness complet (store temporaire + poller)
*/

pub mod chassis_stub;
pub mod fixtures;
pub mod test_utils;

pub use chassis_stub::{Behaviour, MockConnector};
pub use fixtures::ChassisFixture;
pub use test_utils::TestHarness;
