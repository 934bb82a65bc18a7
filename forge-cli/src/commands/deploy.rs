use crate::output::{self, OutputFormat};
use anyhow::{bail, Result};
use forge_stack::{DryRunProvisioner, ForgeStack, HttpProvisioner, Provisioner, Submission};

pub async fn handle_deploy(
    stack: &ForgeStack,
    endpoint: Option<&str>,
    token: Option<&str>,
    dry_run: bool,
    format: OutputFormat,
) -> Result<()> {
    let provisioner = select_provisioner(endpoint, token, dry_run)?;
    let template = stack.template();

    // Backend failures are reported as received, with no retry
    let submission = provisioner.submit(stack.name(), &template).await?;

    match format {
        OutputFormat::Table => print_submission(&submission),
        _ => output::print_single(&submission, format)?,
    }

    Ok(())
}

fn select_provisioner(endpoint: Option<&str>, token: Option<&str>, dry_run: bool) -> Result<Box<dyn Provisioner>> {
    if dry_run {
        output::print_info("Dry run: the template is rendered but not submitted");
        return Ok(Box::new(DryRunProvisioner));
    }

    let Some(endpoint) = endpoint else {
        bail!("No deployment endpoint; pass --endpoint, set FORGE_ENDPOINT, or use --dry-run");
    };

    let mut provisioner = HttpProvisioner::new(endpoint)?;
    if let Some(token) = token {
        provisioner = provisioner.with_token(token);
    }
    Ok(Box::new(provisioner))
}

fn print_submission(submission: &Submission) {
    output::print_success(&format!(
        "Stack '{}' {} ({} resources)",
        submission.stack_name, submission.status, submission.resource_count
    ));
    println!("  At:       {}", submission.submitted_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(message) = &submission.message {
        println!("  Message:  {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_endpoint_unless_dry_run() {
        assert!(select_provisioner(None, None, false).is_err());
        assert!(select_provisioner(None, None, true).is_ok());
        assert!(select_provisioner(Some("http://localhost:8080"), Some("t"), false).is_ok());
    }
}
