use docsearch::{LocalBackend, SearchService};
use std::fs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== docsearch Local Search Example ===\n");

    // Lay out a small content tree in a temporary directory
    let content = tempfile::tempdir()?;
    let docs = content.path().join("docs");
    fs::create_dir_all(&docs)?;

    fs::write(
        docs.join("getting-started.mdx"),
        "---\ntitle: Getting Started\ndescription: Install the CLI and build your first site\n---\n\
         Install the toolchain, then run the development server to preview your documentation.\n",
    )?;
    fs::write(
        docs.join("configuration.mdx"),
        "---\ntitle: Configuration\ndescription: Every option in one place\n---\n\
         The configuration file controls the theme, the navigation and search.\n",
    )?;
    fs::write(
        docs.join("deployment.mdx"),
        "---\ntitle: Deployment\n---\nDeploy the generated documentation to any static host.\n",
    )?;

    println!("✓ Wrote 3 documents to {}\n", content.path().display());

    // In-process engine, nothing to run beside this example
    let service = SearchService::new(LocalBackend::in_memory()?, content.path());

    for query in ["documentation", "configuraton", "instal", ""] {
        println!("--- Search for {:?} ---", query);
        let results = service.query(query).await?;
        println!("Found {} documents", results.len());

        for (i, result) in results.iter().enumerate() {
            println!("\n{}. {} ({})", i + 1, result.title, result.slug);
            if !result.description.is_empty() {
                println!("   {}", result.description);
            }
            println!("   {}", result.snippet.trim());
        }
        println!();
    }

    println!("Index state: {}", service.state());
    Ok(())
}
