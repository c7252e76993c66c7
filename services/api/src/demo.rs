use crate::infra::DirectoryResumeStore;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use talenthub::access::{Actor, Role};
use talenthub::board::{
    ApplicationInput, BoardError, JobBoardService, JobInput, JobView, MemoryStorage, ResumeUpload,
    Salary, SalaryView, UserDraft, ValidationError,
};
use talenthub::config::BoardConfig;
use talenthub::error::AppError;
use talenthub::query::ListQuery;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Write the demo applicant's resume into this directory.
    #[arg(long)]
    pub(crate) resume_dir: Option<PathBuf>,
}

struct Cast {
    root: Actor,
    acme: Actor,
    globex: Actor,
    ada: Actor,
}

impl Cast {
    fn seed(service: &JobBoardService<MemoryStorage>) -> Result<Self, BoardError> {
        let seed = |username: &str, role: Role, is_superuser: bool| -> Result<Actor, BoardError> {
            let user = service.seed_user(UserDraft {
                username: username.to_string(),
                email: format!("{username}@talenthub.example"),
                role,
                is_superuser,
            })?;
            service.resolve_actor(user.id)
        };

        Ok(Self {
            root: seed("root", Role::NotAssigned, true)?,
            acme: seed("acme", Role::Employer, false)?,
            globex: seed("globex", Role::Employer, false)?,
            ada: seed("ada", Role::Applicant, false)?,
        })
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let mut service = JobBoardService::new(
        Arc::new(MemoryStorage::default()),
        BoardConfig::default(),
    );
    let with_resume = args.resume_dir.is_some();
    if let Some(dir) = args.resume_dir {
        service = service.with_resume_store(Arc::new(DirectoryResumeStore::new(dir)));
    }
    let cast = Cast::seed(&service)?;

    println!("TalentHub hiring rules demo");
    println!(
        "Cast: {} (superuser), {} and {} (employers), {} (applicant)",
        cast.root.username, cast.acme.username, cast.globex.username, cast.ada.username
    );

    println!("\n1. Confidential salary");
    let job = service.create_job(
        &cast.acme,
        JobInput {
            title: "Principal Engineer".to_string(),
            description: "Own the platform architecture".to_string(),
            requirements: "Ten years of distributed systems".to_string(),
            salary: Some(demo_salary(5000)?),
            salary_confidential: true,
        },
    )?;
    println!("  {} posted \"{}\" (#{})", cast.acme.username, job.title, job.id);
    for viewer in [&cast.ada, &cast.globex, &cast.acme, &cast.root] {
        let seen = service.get_job(viewer, job.id)?;
        println!("  salary as seen by {:<7} {}", viewer.username, salary_label(&seen));
    }

    println!("\n2. Status changes belong to the job owner");
    let resume = with_resume.then(|| {
        ResumeUpload::new(
            "ada-lovelace-cv.pdf",
            mime_guess::mime::APPLICATION_OCTET_STREAM,
            b"%PDF-1.4 demo resume".to_vec(),
        )
    });
    let application = service.apply(&cast.ada, ApplicationInput { job: job.id }, resume)?;
    println!(
        "  {} applied to #{} with status {}",
        application.username, application.job, application.status
    );
    if let Some(key) = &application.resume {
        println!("  resume stored at {key}");
    }
    let attempt = service.update_application_status(&cast.ada, application.id, "shortlisted");
    println!("  {} shortlists own application: {}", cast.ada.username, outcome(&attempt));
    let attempt = service.update_application_status(&cast.acme, application.id, "shortlisted");
    println!("  {} shortlists the application: {}", cast.acme.username, outcome(&attempt));
    let attempt = service.update_application_status(&cast.acme, application.id, "hired");
    println!("  {} sets status \"hired\": {}", cast.acme.username, outcome(&attempt));

    println!("\n3. One application per job");
    let attempt = service.apply(&cast.ada, ApplicationInput { job: job.id }, None);
    println!("  {} applies again: {}", cast.ada.username, outcome(&attempt));

    println!("\n4. Deleting a job");
    let attempt = service.delete_job(&cast.globex, job.id);
    println!("  {} deletes #{}: {}", cast.globex.username, job.id, outcome(&attempt));
    let attempt = service.delete_job(&cast.root, job.id);
    println!("  {} deletes #{}: {}", cast.root.username, job.id, outcome(&attempt));
    let remaining = service.list_applications(&cast.root, &ListQuery::new())?;
    println!("  applications left on the board: {}", remaining.count);

    Ok(())
}

fn demo_salary(units: u64) -> Result<Salary, BoardError> {
    Salary::whole(units)
        .map_err(|err| ValidationError::field("salary", err.to_string()).into())
}

fn salary_label(job: &JobView) -> String {
    match &job.salary {
        Some(SalaryView::Disclosed(salary)) => salary.to_string(),
        Some(SalaryView::Confidential) => SalaryView::SENTINEL.to_string(),
        None => "not listed".to_string(),
    }
}

fn outcome<T>(result: &Result<T, BoardError>) -> String {
    match result {
        Ok(_) => "ok".to_string(),
        Err(err) => format!("refused ({err})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_runs_in_memory() {
        run_demo(DemoArgs::default()).expect("demo completes");
    }

    #[test]
    fn outcomes_name_the_refusal() {
        let refused: Result<(), BoardError> = Err(BoardError::Unauthenticated);
        assert!(outcome(&refused).starts_with("refused ("));
        assert_eq!(outcome(&Ok::<(), BoardError>(())), "ok");
    }
}
