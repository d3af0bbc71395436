use crate::SourceFile;
use crate::error::Result;
use crate::mutant::Mutant;
use crate::mutators::MutatorRegistry;
use crate::tree::SourceTree;

/// Walk every file marked for mutation and produce the full mutant sequence.
///
/// Order is deterministic: file order, then pre-order traversal, then mutator
/// registration order, then alternative order within one mutator. Ids are
/// assigned sequentially from 1 across the whole run. A parse failure on any
/// file aborts generation for the whole run.
pub fn generate_mutants(files: &[SourceFile], registry: &MutatorRegistry) -> Result<Vec<Mutant>> {
    let mutators = registry.mutators();
    let mut mutants = Vec::new();

    for file in files {
        let tree = SourceTree::parse(&file.path, &file.content)?;
        for node in tree.nodes() {
            for mutator in &mutators {
                for replacement in mutator.apply(&tree, node) {
                    let origin = tree.node(replacement.origin);
                    mutants.push(Mutant::new(
                        mutants.len() + 1,
                        mutator.name(),
                        file.path.clone(),
                        &file.content,
                        replacement.text,
                        origin.location(),
                    ));
                }
            }
        }
    }

    Ok(mutants)
}
