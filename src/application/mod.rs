//! The job-application assistant built on the core workflow engine.

pub mod assistant;
pub mod definition;

pub use assistant::{
    ApplicationError, ApplicationMaterials, ApplicationRequest, JobAssistant, ResumeUpload,
};
pub use definition::{
    BUILD_PROFILE, EXTRACT_REQUIREMENTS, INTERVIEW_MATERIALS_FILE, PREPARE_INTERVIEW,
    TAILOR_RESUME, TAILORED_RESUME_FILE, job_application_workflow,
};
