use crate::infra::{
    InMemoryApplicationStore, InMemoryApprovalLedger, InMemoryFundsGateway,
    InMemoryNotificationStore, StaticReviewerDirectory,
};
use clap::Args;
use lendflow::error::AppError;
use lendflow::workflows::underwriting::{
    AccountId, Actor, LoanApplication, NotificationDispatcher, RecipientRole, SampledScreen,
    Stage, SubmissionRequest, UnderwritingPolicy, UnderwritingService,
};
use std::sync::Arc;

const DEMO_REVIEWER: &str = "reviewer@lendflow.dev";
const DEMO_ANALYST: &str = "analyst@lendflow.dev";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Seed for the political-exposure draw, so reruns tell the same story.
    #[arg(long, default_value_t = 2024)]
    pub(crate) seed: u64,
    /// Print the reviewer inbox after the batch is processed.
    #[arg(long)]
    pub(crate) show_inbox: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { seed, show_inbox } = args;

    let policy = UnderwritingPolicy::default();
    let screen = Arc::new(SampledScreen::seeded(seed, policy.political_hit_rate));
    let store = Arc::new(InMemoryApplicationStore::default());
    let ledger = Arc::new(InMemoryApprovalLedger::default());
    let notifications = Arc::new(InMemoryNotificationStore::default());
    let reviewers = Arc::new(StaticReviewerDirectory::new(vec![DEMO_REVIEWER.to_string()]));
    let funds = Arc::new(InMemoryFundsGateway::default());
    let notifier = NotificationDispatcher::new(notifications, reviewers);
    let service = UnderwritingService::new(store, ledger, notifier, funds.clone(), policy)
        .with_screen(screen);

    println!("Loan underwriting workflow demo (seed {seed})");

    println!("\nAutomatic pipeline over a seeded batch");
    for (label, submission) in seeded_batch() {
        let submitted = service.submit(submission).await?;
        let processed = service.process(&submitted.application_id).await?;
        print_outcome(label, &processed);
    }

    println!("\nManual review walk");
    let submitted = service.submit(manual_candidate()).await?;
    println!("- Submitted {} for analyst review", submitted.application_id);
    let analyst = Actor {
        email: DEMO_ANALYST.to_string(),
        role: "SENIOR_ANALYST".to_string(),
    };
    for stage in Stage::ALL {
        let approval = service
            .approve(
                &submitted.application_id,
                Some(analyst.clone()),
                Some(stage),
                Some(format!("{} checks complete", stage.label())),
            )
            .await?;
        if approval.fully_approved {
            println!("  - {} approved; application fully approved", stage.label());
        } else {
            println!(
                "  - {} approved, now {}",
                stage.label(),
                approval.application.state().label()
            );
        }
    }

    let snapshot = service.stats().await?;
    println!("\nPortfolio snapshot");
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("snapshot unavailable: {err}"),
    }

    println!("\nMost recent approval log entries");
    for entry in service.decision_log(None, 8).await? {
        let actor = entry
            .actor
            .as_ref()
            .map(|actor| actor.email.as_str())
            .unwrap_or("pipeline");
        println!(
            "- {} | {} | {} | by {}",
            entry.application_id,
            entry.stage,
            entry.action.label(),
            actor
        );
    }

    let credited = funds.credits();
    if credited.is_empty() {
        println!("\nDisbursements: none initiated");
    } else {
        println!("\nDisbursements");
        for (account, amount) in credited {
            println!("- {account} credited ${amount:.2}");
        }
    }

    if show_inbox {
        println!("\nReviewer inbox ({DEMO_REVIEWER})");
        for record in service
            .unread_notifications(DEMO_REVIEWER, RecipientRole::Reviewer)
            .await?
        {
            println!("- {}", record.message);
        }
    }

    Ok(())
}

fn print_outcome(label: &str, application: &LoanApplication) {
    let model = application
        .model_decision
        .map_or("NONE", |decision| decision.label());
    println!(
        "- {label}: {} -> {} (model said {model})",
        application.application_id,
        application.state().label()
    );
    if let Some(remarks) = &application.final_remarks {
        println!("  {remarks}");
    }
}

fn seeded_batch() -> Vec<(&'static str, SubmissionRequest)> {
    vec![
        (
            "steady income, strong credit",
            SubmissionRequest {
                applicant_name: "Priya Nair".to_string(),
                email: "priya.nair@example.com".to_string(),
                phone: "+91-98-4455-0192".to_string(),
                region: "apac".to_string(),
                country: "India".to_string(),
                income: 95_000.0,
                debt: 15_000.0,
                credit_score: 770,
                loan_amount: 180_000.0,
                loan_purpose: "Home purchase".to_string(),
                account_id: Some(AccountId("ACC-1001".to_string())),
                ..base_submission()
            },
        ),
        (
            "debt-heavy profile",
            SubmissionRequest {
                applicant_name: "Miles Archer".to_string(),
                email: "miles.archer@example.com".to_string(),
                phone: "+1-604-555-0133".to_string(),
                region: "na".to_string(),
                country: "Canada".to_string(),
                income: 60_000.0,
                debt: 30_000.0,
                credit_score: 710,
                loan_amount: 120_000.0,
                loan_purpose: "Debt consolidation".to_string(),
                account_id: Some(AccountId("ACC-1002".to_string())),
                ..base_submission()
            },
        ),
        (
            "thin credit file",
            SubmissionRequest {
                applicant_name: "Sofia Reyes".to_string(),
                email: "sofia.reyes@example.com".to_string(),
                phone: "+56-2-2555-0147".to_string(),
                region: "sa".to_string(),
                country: "Chile".to_string(),
                income: 80_000.0,
                debt: 10_000.0,
                credit_score: 590,
                loan_amount: 150_000.0,
                loan_purpose: "Small business".to_string(),
                ..base_submission()
            },
        ),
        (
            "sanctioned email domain",
            SubmissionRequest {
                applicant_name: "Ivan Petrov".to_string(),
                email: "ivan.petrov@sanctioned.com".to_string(),
                phone: "+48-22-555-0190".to_string(),
                region: "eu".to_string(),
                country: "Poland".to_string(),
                income: 90_000.0,
                debt: 9_000.0,
                credit_score: 730,
                loan_amount: 140_000.0,
                loan_purpose: "Vehicle purchase".to_string(),
                ..base_submission()
            },
        ),
        (
            "unrecognized region",
            SubmissionRequest {
                applicant_name: "Ada Quinn".to_string(),
                email: "ada.quinn@example.com".to_string(),
                region: "atlantis".to_string(),
                country: "Portugal".to_string(),
                income: 85_000.0,
                debt: 8_500.0,
                credit_score: 740,
                loan_amount: 160_000.0,
                loan_purpose: "Education".to_string(),
                ..base_submission()
            },
        ),
        (
            "senior-relative name marker",
            SubmissionRequest {
                applicant_name: "Martin Castro Jr".to_string(),
                email: "martin.castro@example.com".to_string(),
                phone: "+20-2-2555-0104".to_string(),
                region: "mea".to_string(),
                country: "Egypt".to_string(),
                income: 110_000.0,
                debt: 22_000.0,
                credit_score: 745,
                loan_amount: 210_000.0,
                loan_purpose: "Home renovation".to_string(),
                account_id: Some(AccountId("ACC-1006".to_string())),
                ..base_submission()
            },
        ),
        (
            "high-value loan",
            SubmissionRequest {
                applicant_name: "Elena Moreau".to_string(),
                email: "elena.moreau@example.com".to_string(),
                phone: "+33-1-5555-0162".to_string(),
                region: "emea".to_string(),
                country: "France".to_string(),
                income: 260_000.0,
                debt: 30_000.0,
                credit_score: 785,
                loan_amount: 620_000.0,
                loan_purpose: "Property investment".to_string(),
                account_id: Some(AccountId("ACC-1007".to_string())),
                ..base_submission()
            },
        ),
    ]
}

fn manual_candidate() -> SubmissionRequest {
    SubmissionRequest {
        applicant_name: "Jordan Wells".to_string(),
        email: "jordan.wells@example.com".to_string(),
        phone: "+353-1-555-0128".to_string(),
        region: "emea".to_string(),
        country: "Ireland".to_string(),
        income: 120_000.0,
        debt: 20_000.0,
        credit_score: 760,
        loan_amount: 250_000.0,
        loan_purpose: "Home purchase".to_string(),
        account_id: Some(AccountId("ACC-2042".to_string())),
        ..base_submission()
    }
}

fn base_submission() -> SubmissionRequest {
    SubmissionRequest {
        applicant_name: String::new(),
        email: String::new(),
        phone: String::new(),
        region: String::new(),
        country: String::new(),
        income: 0.0,
        debt: 0.0,
        credit_score: 0,
        loan_amount: 0.0,
        loan_purpose: String::new(),
        documents_uploaded: true,
        documents: Vec::new(),
        account_id: None,
    }
}
