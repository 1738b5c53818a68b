//! Default council roster
//!
//! Six engineers with their tool bindings. Remote tools point at the
//! `gilfoyle_aws` and `judy_k8s` servers from the default tool config.

use std::time::Duration;

use serde_json::json;

use crate::agent::registry::{Agent, AgentBuilder};
use crate::tools::ToolBinding;

const TEAM_RULES: &str = "The user is your boss: show appropriate respect while staying in character. \
Keep it to two sentences at most, technically accurate and actionable. \
When tool results are provided, work them into your answer naturally.";

fn persona(body: &str) -> String {
    format!("{}\n\n{}", body, TEAM_RULES)
}

/// The built-in roster in declaration order
pub fn default_roster() -> Vec<Agent> {
    vec![gilfoyle(), judy(), rick(), wednesday(), elliot(), saul()]
}

fn gilfoyle() -> Agent {
    AgentBuilder::new("gilfoyle")
        .name("Gilfoyle")
        .role("Infrastructure Administrator")
        .persona(persona(
            "You are Gilfoyle, a deadpan infrastructure engineer with no patience for \
             inefficiency. You prefer elegant systems and say so bluntly.",
        ))
        .style("dismissive and sarcastic")
        .triggers([
            "infrastructure", "cloud", "aws", "server", "network", "terraform", "scaling",
            "architecture", "performance", "load",
        ])
        .tool(
            ToolBinding::remote(
                "describe_instances",
                "List and describe EC2 instances with detailed metrics",
                "gilfoyle_aws",
                "describe_instances",
            )
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "region": {"type": "string", "description": "AWS region"},
                    "instance_ids": {"type": "array", "items": {"type": "string"}}
                }
            }))
            .with_fallback("aws ec2 describe-instances --output table"),
        )
        .tool(
            ToolBinding::remote(
                "get_cost_analysis",
                "Cost breakdown and optimization recommendations",
                "gilfoyle_aws",
                "get_cost_analysis",
            )
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "service": {"type": "string", "description": "AWS service to analyze"},
                    "time_period": {"type": "string", "description": "daily, weekly or monthly"}
                }
            })),
        )
        .tool(
            ToolBinding::local("aws_status", "Check AWS account status", "aws sts get-caller-identity")
                .with_timeout(Duration::from_secs(15)),
        )
        .tool(
            ToolBinding::local(
                "aws_regions",
                "List available AWS regions",
                "aws ec2 describe-regions --query 'Regions[].RegionName' --output table",
            )
            .with_timeout(Duration::from_secs(20)),
        )
        .weight(1.2)
        .build()
}

fn judy() -> Agent {
    AgentBuilder::new("judy")
        .name("Judy")
        .role("Senior DevOps Engineer")
        .persona(persona(
            "You are Judy, a no-nonsense DevOps engineer who protects her clusters and \
             pipelines fiercely and skips the corporate fluff.",
        ))
        .style("direct and tough")
        .triggers([
            "kubernetes", "docker", "k8s", "deployment", "ci/cd", "pipeline", "github", "actions",
            "helm", "container", "devops", "monitoring",
        ])
        .tool(
            ToolBinding::remote(
                "analyze_cluster_health",
                "Analyze cluster health, resource usage, and performance",
                "judy_k8s",
                "analyze_cluster_health",
            )
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "namespace": {"type": "string", "description": "Kubernetes namespace"},
                    "include_metrics": {"type": "boolean", "description": "Include performance metrics"}
                }
            }))
            .with_fallback("kubectl get pods --all-namespaces"),
        )
        .tool(
            ToolBinding::remote(
                "optimize_resources",
                "Analyze and recommend resource optimizations",
                "judy_k8s",
                "optimize_resources",
            )
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "workload_type": {"type": "string", "description": "Type of workload to optimize"}
                }
            }))
            .with_fallback("kubectl top pods --all-namespaces"),
        )
        .tool(
            ToolBinding::local("kubectl_status", "Check Kubernetes cluster status", "kubectl cluster-info")
                .with_timeout(Duration::from_secs(15)),
        )
        .tool(
            ToolBinding::local("kubectl_pods", "List pods in cluster", "kubectl get pods --all-namespaces")
                .with_timeout(Duration::from_secs(20)),
        )
        .tool(
            ToolBinding::local("kubectl_nodes", "Check node status", "kubectl get nodes")
                .with_timeout(Duration::from_secs(15)),
        )
        .weight(1.3)
        .build()
}

fn rick() -> Agent {
    AgentBuilder::new("rick")
        .name("Rick")
        .role("Senior Backend Engineer")
        .persona(persona(
            "You are Rick, a genius backend engineer who finds most problems trivial and \
             most people slow. Your fixes are brilliant and your patience is short.",
        ))
        .style("genius but dismissive")
        .triggers([
            "backend", "api", "database", "algorithm", "optimization", "python", "node",
            "microservices", "queue", "cache", "logic", "code",
        ])
        .tool(ToolBinding::local("api_test", "Test an API endpoint", "curl -s -I {url}").with_timeout(Duration::from_secs(10)))
        .tool(ToolBinding::local("dns_lookup", "Look up DNS records", "dig {domain}").with_timeout(Duration::from_secs(10)))
        .tool(
            ToolBinding::local(
                "port_check",
                "Check if a port is open",
                "curl -s --connect-timeout 5 {host}:{port}",
            )
            .with_timeout(Duration::from_secs(10)),
        )
        .weight(1.1)
        .build()
}

fn wednesday() -> Agent {
    AgentBuilder::new("wednesday")
        .name("Wednesday")
        .role("Frontend Developer")
        .persona(persona(
            "You are Wednesday, a frontend developer with a taste for dark, minimal interfaces \
             and open contempt for bloated frameworks.",
        ))
        .style("dark and monotone")
        .triggers([
            "frontend", "react", "ui", "ux", "css", "javascript", "typescript", "component",
            "design", "user", "interface", "responsive", "vue", "angular",
        ])
        .tool(
            ToolBinding::local("web_check", "Check website status and headers", "curl -s -I {url}")
                .with_timeout(Duration::from_secs(10)),
        )
        .weight(1.0)
        .build()
}

fn elliot() -> Agent {
    AgentBuilder::new("elliot")
        .name("Elliot")
        .role("Senior Security Engineer")
        .persona(persona(
            "You are Elliot, a quiet and suspicious security engineer who sees an attack \
             surface in everything and trusts no vendor.",
        ))
        .style("paranoid and intense")
        .triggers([
            "security", "vulnerability", "hack", "encryption", "auth", "pentest", "firewall",
            "zero-day", "exploit", "breach", "audit", "compliance", "owasp",
        ])
        .tool(
            ToolBinding::local("security_headers", "Check security headers on a website", "curl -s -I {url}")
                .with_timeout(Duration::from_secs(10)),
        )
        .tool(
            ToolBinding::local("dns_enum", "Enumerate DNS records", "dig {domain} ANY")
                .with_timeout(Duration::from_secs(15)),
        )
        .weight(1.4)
        .build()
}

fn saul() -> Agent {
    AgentBuilder::new("saul")
        .name("Saul")
        .role("Project Manager")
        .persona(persona(
            "You are Saul, a fast-talking project manager who can sell any timeline and \
             always finds a creative reading of the requirements.",
        ))
        .style("smooth-talking and optimistic")
        .triggers([
            "timeline", "deadline", "budget", "client", "meeting", "agile", "scrum", "requirement",
            "stakeholder", "project", "planning", "estimate", "delivery",
        ])
        .weight(0.8)
        .build()
}
