//! A packaging [`Assembler`] that emits a JSON manifest of the deposit's
//! files and metadata instead of a BagIt/METS archive — the dev-mode stand-in
//! for whatever packaging specification a production deployment's assembler
//! beans implement.

use async_trait::async_trait;
use deposit_collaborators::{AssembleError, Assembler, PackageMeta, PackageStream};
use deposit_primitives::{AssemblerOptions, DepositSubmission};
use serde::Serialize;

#[derive(Debug, Default)]
pub struct ManifestAssembler;

#[derive(Serialize)]
struct Manifest<'a> {
    submission_id: String,
    files: &'a [deposit_primitives::DepositFile],
    persons: &'a [deposit_primitives::Person],
}

#[async_trait]
impl Assembler for ManifestAssembler {
    async fn assemble(
        &self,
        deposit_submission: &DepositSubmission,
        options: &AssemblerOptions,
    ) -> Result<PackageStream, AssembleError> {
        if deposit_submission.files.is_empty() {
            return Err(AssembleError::Failed("no files to package".to_string()));
        }

        let manifest = Manifest {
            submission_id: deposit_submission.submission_id.to_string(),
            files: &deposit_submission.files,
            persons: &deposit_submission.persons,
        };

        let bytes = serde_json::to_vec_pretty(&manifest).map_err(|err| AssembleError::Failed(err.to_string()))?;

        let meta = PackageMeta {
            archive: options.archive.clone(),
            compression: options.compression.clone(),
            checksum_algorithms: options.checksum_algorithms.clone(),
        };
        Ok(PackageStream::new(meta, Box::new(std::io::Cursor::new(bytes))))
    }
}
