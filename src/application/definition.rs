//! The job-application workflow: four stages and the edges between them.

use crate::core::error::DefinitionError;
use crate::core::stage::{Capability, Persona, Stage, ToolRequest};
use crate::core::workflow::Workflow;

pub const EXTRACT_REQUIREMENTS: &str = "extract-requirements";
pub const BUILD_PROFILE: &str = "build-profile";
pub const TAILOR_RESUME: &str = "tailor-resume";
pub const PREPARE_INTERVIEW: &str = "prepare-interview";

pub const TAILORED_RESUME_FILE: &str = "tailored_resume.md";
pub const INTERVIEW_MATERIALS_FILE: &str = "interview_materials.md";

const RESEARCH: [Capability; 2] = [Capability::WebSearch, Capability::WebScrape];

fn researcher() -> Persona {
    Persona::new(
        "Tech Job Researcher",
        "Make sure to do amazing analysis on job posting to help job applicants",
        "As a Job Researcher, your prowess in navigating and extracting critical \
         information from job postings is unmatched. Your skills help pinpoint the \
         necessary qualifications and skills sought by employers, forming the \
         foundation for effective application tailoring.",
    )
}

fn profiler() -> Persona {
    Persona::new(
        "Personal Profiler for Engineers",
        "Do incredible research on job applicants to help them stand out in the job market",
        "Equipped with analytical prowess, you dissect and synthesize information \
         from diverse sources to craft comprehensive personal and professional \
         profiles, laying the groundwork for personalized resume enhancements.",
    )
}

fn resume_strategist() -> Persona {
    Persona::new(
        "Resume Strategist for Engineers",
        "Find all the best ways to make a resume stand out in the job market.",
        "With a strategic mind and an eye for detail, you excel at refining resumes \
         to highlight the most relevant skills and experiences, ensuring they \
         resonate perfectly with the job's requirements.",
    )
}

fn interview_preparer() -> Persona {
    Persona::new(
        "Engineering Interview Preparer",
        "Create interview questions and talking points based on the resume and job requirements",
        "Your role is crucial in anticipating the dynamics of interviews. With your \
         ability to formulate key questions and talking points, you prepare \
         candidates for success, ensuring they can confidently address all aspects \
         of the job they are applying for.",
    )
}

/// Builds the four-stage workflow.
///
/// `extract-requirements` and `build-profile` have no dependencies and run
/// side by side; `tailor-resume` waits for both, and `prepare-interview`
/// waits for all three.
pub fn job_application_workflow() -> Result<Workflow, DefinitionError> {
    Workflow::builder()
        .stage(
            Stage::builder(EXTRACT_REQUIREMENTS)
                .persona(researcher())
                .description(
                    "Analyze the job posting URL provided ({job_posting_url}) to extract key \
                     skills, experiences, and qualifications required. Use the research notes \
                     to gather content and identify and categorize the requirements.",
                )
                .expected_output(
                    "A structured list of job requirements, including necessary skills, \
                     qualifications, and experiences.",
                )
                .capabilities(RESEARCH)
                .tool(ToolRequest::scrape("{job_posting_url}"))
                .tool(ToolRequest::search("{job_posting_url} job requirements qualifications")),
        )
        .stage(
            Stage::builder(BUILD_PROFILE)
                .persona(profiler())
                .description(
                    "Compile a detailed personal and professional profile using the GitHub \
                     ({github_url}) URL, and personal write-up ({personal_writeup}). Use the \
                     research notes to extract and synthesize information from these sources.",
                )
                .expected_output(
                    "A comprehensive profile document that includes skills, project \
                     experiences, contributions, interests, and communication style.",
                )
                .capabilities(Capability::ALL)
                .tool(ToolRequest::scrape("{github_url}"))
                .tool(ToolRequest::search("{github_url} projects contributions"))
                .tool(ToolRequest::read_document())
                .tool(ToolRequest::search_document("skills, projects and technologies")),
        )
        .stage(
            Stage::builder(TAILOR_RESUME)
                .persona(resume_strategist())
                .description(
                    "Using the profile and job requirements obtained from previous stages, \
                     tailor the resume to highlight the most relevant areas. Format the resume \
                     using Markdown. Use the research notes to adjust and enhance the resume \
                     content. Make sure this is the best resume but don't make up any \
                     information. Update every section, including the initial summary, work \
                     experience, skills, and education, to better reflect the candidate's \
                     abilities and how they match the job posting.",
                )
                .expected_output(
                    "An updated resume that effectively highlights the candidate's \
                     qualifications and experiences relevant to the job.",
                )
                .capabilities(Capability::ALL)
                .depends_on(EXTRACT_REQUIREMENTS)
                .depends_on(BUILD_PROFILE)
                .tool(ToolRequest::read_document())
                .tool(ToolRequest::search_document("work experience, education and skills"))
                .output_file(TAILORED_RESUME_FILE),
        )
        .stage(
            Stage::builder(PREPARE_INTERVIEW)
                .persona(interview_preparer())
                .description(
                    "Create a set of potential interview questions and talking points based \
                     on the tailored resume and job requirements. Format the questions and \
                     talking points using Markdown. Make sure these questions and talking \
                     points help the candidate highlight the main points of the resume and \
                     how it matches the job posting.",
                )
                .expected_output(
                    "A document containing key questions and talking points that the \
                     candidate should prepare for the initial interview.",
                )
                .capabilities(Capability::ALL)
                .depends_on(EXTRACT_REQUIREMENTS)
                .depends_on(BUILD_PROFILE)
                .depends_on(TAILOR_RESUME)
                .tool(ToolRequest::search_document("achievements and results worth discussing"))
                .output_file(INTERVIEW_MATERIALS_FILE),
        )
        .build()
}
