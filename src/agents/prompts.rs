//! Role prompts and per-call prompt builders.

use super::{FixRequest, GenerationRequest, PlanRequest, ReviewRequest};
use crate::context::EMPTY_PROJECT;

pub const PLANNER_ROLE: &str = "\
You are a software architect. You analyze project specifications and turn them \
into structured, ordered build plans.

Prefer boring, proven technology. Optimize for simplicity and fast iteration.

When asked for a plan, answer with the exact YAML structure requested and \
nothing else. Do not wrap the YAML in markdown fences unless asked.";

pub const CODER_ROLE: &str = "\
You are an expert software developer who writes complete, production-ready code.

RULES:
- Write COMPLETE files. Never leave placeholders such as '...' or 'TODO: implement'.
- Every file must work as written, with all imports and error handling.
- Follow the project's build rules exactly.

Emit every file in this exact format:

```file:path/to/file.ext
<complete file contents>
```";

pub const REVIEWER_ROLE: &str = "\
You are a code reviewer. You check generated code for correctness, consistency \
and completeness: missing imports, references to undefined symbols or missing \
files, API contracts that disagree between components, missing error handling \
on critical paths, and security problems such as hardcoded secrets or injection.

Be concise. Report real defects only, not style preferences.";

pub fn plan_prompt(request: &PlanRequest) -> String {
    match request.feature.as_deref() {
        Some(feature) => incremental_plan_prompt(request, feature),
        None => full_plan_prompt(request),
    }
}

fn full_plan_prompt(request: &PlanRequest) -> String {
    let existing = if request.context.trim().is_empty() || request.context == EMPTY_PROJECT {
        String::new()
    } else {
        format!(
            "\n## Existing Project Files\n{}\n\nThis is an existing project. Plan tasks that build on what exists.\n",
            request.context
        )
    };

    format!(
        "\
## Project Specification
{spec}

## Build Rules
{rules}
{existing}
Analyze the specification and rules, then output a build plan as YAML.

Requirements for the plan:
- 3-8 focused tasks, each producing 1-4 files
- dependencies first (data models before routes, and so on)
- the first task sets up the project (manifests, config, dependencies)
- the last task wires everything together
- tasks small enough to write every file completely in one pass

Use exactly this structure:

decisions:
  stack:
    language: \"...\"
    framework: \"...\"
    database: \"...\"
  architecture: \"How the components connect\"
  reasoning: \"Why these choices, in one or two sentences\"

tasks:
  - id: task_01
    name: \"Set up project structure and dependencies\"
    description: \"Create the skeleton with package manifests and config files\"
    agent: coder
    files: [requirements.txt, src/main.py]
  - id: task_02
    name: \"...\"
    description: \"...\"
    agent: coder
    files: [...]

Output ONLY the YAML.",
        spec = request.spec,
        rules = request.rules,
        existing = existing,
    )
}

fn incremental_plan_prompt(request: &PlanRequest, feature: &str) -> String {
    format!(
        "\
## Project Specification
{spec}

## Build Rules
{rules}

## Existing Project Files
{context}

## Feature to Add
{feature}

Plan the tasks needed to add this feature to the existing project. Decide which \
files must be modified and which must be created.

Use exactly this structure:

decisions:
  changes_needed: \"Summary of what changes\"
  files_to_modify: [existing files to change]
  files_to_create: [new files]
  reasoning: \"Why these changes\"

tasks:
  - id: task_01
    name: \"Task name\"
    description: \"What to do, in detail\"
    agent: coder
    files: [files this task touches]

Output ONLY the YAML.",
        spec = request.spec,
        rules = request.rules,
        context = request.context,
        feature = feature,
    )
}

pub fn generation_prompt(request: &GenerationRequest) -> String {
    format!(
        "\
## Project Specification
{spec}

## Build Rules
{rules}

## Architecture Decisions
{decisions}

## Current Task
**{name}**
{description}

**Files to produce:** {files}

## Existing Project Context
{context}

Write the COMPLETE contents of every file for this task, each in this format:

```file:path/to/filename.ext
<complete file contents>
```

When modifying an existing file, output the ENTIRE updated file.",
        spec = request.spec,
        rules = request.rules,
        decisions = request.decisions,
        name = request.task_name,
        description = request.task_description,
        files = request.files.join(", "),
        context = request.context,
    )
}

pub fn fix_prompt(request: &FixRequest) -> String {
    format!(
        "\
## Build Rules
{rules}

## File to Fix
**{path}**

Current content:
```
{content}
```

## Issue to Fix
{issue}

Output the COMPLETE corrected file in this format:

```file:{path}
<complete corrected file contents>
```",
        rules = request.rules,
        path = request.path,
        content = request.current_content,
        issue = request.issue,
    )
}

pub fn review_prompt(request: &ReviewRequest) -> String {
    let files: String = request
        .files
        .iter()
        .map(|(path, content)| format!("\n### {}\n```\n{}\n```\n", path, content))
        .collect();

    format!(
        "\
## Project Specification
{spec}

## Build Rules
{rules}

## Generated Files
{files}

Review these files. Check for:
1. Missing imports or undefined references
2. API contracts that disagree between components
3. Files that are imported or referenced but missing
4. Security issues (hardcoded secrets, injection)
5. Missing error handling on critical paths

Answer as YAML:

passed: false
issues:
  - file: \"path/to/file\"
    severity: error
    message: \"What is wrong\"
  - file: \"path/to/other\"
    severity: warning
    message: \"What could be better\"

If there are no issues, answer:

passed: true
issues: []

Output ONLY the YAML.",
        spec = request.spec,
        rules = request.rules,
        files = files,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn plan_request(feature: Option<&str>, context: &str) -> PlanRequest {
        PlanRequest {
            spec: "# Todo".into(),
            rules: "Use Flask".into(),
            context: context.into(),
            feature: feature.map(str::to_string),
        }
    }

    #[test]
    fn test_fresh_project_omits_existing_files_section() {
        let prompt = plan_prompt(&plan_request(None, EMPTY_PROJECT));
        assert!(prompt.contains("# Todo"));
        assert!(!prompt.contains("## Existing Project Files"));
    }

    #[test]
    fn test_existing_project_included() {
        let prompt = plan_prompt(&plan_request(None, "### src/app.py\n```\nx\n```\n"));
        assert!(prompt.contains("## Existing Project Files\n### src/app.py"));
    }

    #[test]
    fn test_incremental_prompt_asks_for_changes() {
        let prompt = plan_prompt(&plan_request(Some("add login"), "ctx"));
        assert!(prompt.contains("## Feature to Add\nadd login"));
        assert!(prompt.contains("files_to_create"));
    }

    #[test]
    fn test_fix_prompt_names_target_file() {
        let prompt = fix_prompt(&FixRequest {
            path: "src/app.py".into(),
            current_content: "import flask".into(),
            issue: "unused import".into(),
            spec: String::new(),
            rules: String::new(),
        });
        assert!(prompt.contains("```file:src/app.py"));
        assert!(prompt.contains("unused import"));
    }

    #[test]
    fn test_review_prompt_lists_files() {
        let mut files = BTreeMap::new();
        files.insert("src/a.py".to_string(), "a = 1".to_string());
        let prompt = review_prompt(&ReviewRequest {
            files,
            spec: "s".into(),
            rules: "r".into(),
        });
        assert!(prompt.contains("### src/a.py\n```\na = 1\n```"));
    }
}
