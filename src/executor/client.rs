use async_trait::async_trait;
use gcp_bigquery_client::Client;
use gcp_bigquery_client::model::get_query_results_parameters::GetQueryResultsParameters;
use gcp_bigquery_client::model::query_parameter::QueryParameter;
use gcp_bigquery_client::model::query_parameter_type::QueryParameterType;
use gcp_bigquery_client::model::query_parameter_value::QueryParameterValue;
use gcp_bigquery_client::model::query_request::QueryRequest;
use std::time::Duration;
use tracing::debug;
use crate::error::{BigQueryError, PublishError, Result, job_failure, parse_bq_error, ErrorContext};
use crate::query::Parameter;
use super::rows::decode_rows;
use super::warehouse::{JobHandle, QueryJob, ResultPage, TableId, Warehouse};

const QUERY_TIMEOUT_MS: i32 = 10_000;
const INITIAL_POLL_INTERVAL: Duration = Duration::from_millis(500);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct BqClient {
    client: Client,
    project_id: String,
}

impl BqClient {
    pub async fn new(project_id: impl Into<String>) -> Result<Self> {
        let client = Client::from_application_default_credentials()
            .await
            .map_err(|e| {
                let ctx = ErrorContext::new("client_init");
                PublishError::QueryExecution(parse_bq_error(e, ctx))
            })?;

        Ok(Self {
            client,
            project_id: project_id.into(),
        })
    }

    fn to_query_parameter(parameter: &Parameter) -> QueryParameter {
        QueryParameter {
            name: Some(parameter.name.clone()),
            parameter_type: Some(QueryParameterType {
                array_type: None,
                struct_types: None,
                r#type: parameter.param_type.as_str().to_string(),
            }),
            parameter_value: Some(QueryParameterValue {
                array_values: None,
                struct_values: None,
                value: Some(parameter.value.clone()),
            }),
        }
    }

    async fn wait_for_job(&self, job: &JobHandle, sql: &str) -> Result<()> {
        let mut interval = INITIAL_POLL_INTERVAL;

        loop {
            let params = GetQueryResultsParameters {
                location: job.location.clone(),
                max_results: Some(0),
                timeout_ms: Some(QUERY_TIMEOUT_MS),
                ..Default::default()
            };

            let response = self.client
                .job()
                .get_query_results(&self.project_id, &job.job_id, params)
                .await
                .map_err(|e| {
                    let ctx = ErrorContext::new("wait_for_job").with_sql(sql);
                    PublishError::QueryExecution(parse_bq_error(e, ctx))
                })?;

            if response.job_complete == Some(true) {
                return self.check_job_status(job).await;
            }

            debug!("Job {} still running, polling again in {:?}", job.job_id, interval);
            tokio::time::sleep(interval).await;
            interval = (interval * 2).min(MAX_POLL_INTERVAL);
        }
    }

    async fn check_job_status(&self, job: &JobHandle) -> Result<()> {
        let details = self.client
            .job()
            .get_job(&self.project_id, &job.job_id, job.location.as_deref())
            .await
            .map_err(|e| PublishError::QueryExecution(parse_bq_error(e, ErrorContext::new("get_job"))))?;

        match job_failure(&job.job_id, details.status.as_ref()) {
            Some(failure) => Err(PublishError::QueryExecution(failure)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Warehouse for BqClient {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn run_query(&self, job: &QueryJob) -> Result<JobHandle> {
        let mut request = QueryRequest::new(job.sql.as_str());
        request.timeout_ms = Some(QUERY_TIMEOUT_MS);
        if !job.parameters.is_empty() {
            request.parameter_mode = Some("NAMED".to_string());
            request.query_parameters = Some(
                job.parameters.iter().map(Self::to_query_parameter).collect(),
            );
        }

        let response = self.client
            .job()
            .query(&self.project_id, request)
            .await
            .map_err(|e| {
                let ctx = ErrorContext::new("run_query").with_sql(&job.sql);
                PublishError::QueryExecution(parse_bq_error(e, ctx))
            })?;

        let (job_id, location) = match response.job_reference.as_ref() {
            Some(reference) => (reference.job_id.clone(), reference.location.clone()),
            None => (None, None),
        };
        let job_id = job_id.ok_or_else(|| {
            PublishError::QueryExecution(BigQueryError::Unexpected {
                operation: "run_query".to_string(),
                message: "query response carried no job reference".to_string(),
            })
        })?;

        let handle = JobHandle { job_id, location };

        if response.job_complete != Some(true) {
            self.wait_for_job(&handle, &job.sql).await?;
        }

        debug!("Job {} complete", handle.job_id);
        Ok(handle)
    }

    async fn fetch_page(
        &self,
        job: &JobHandle,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<ResultPage> {
        let max_results = i32::try_from(page_size)
            .map_err(|_| PublishError::Config(format!("page size {} is out of range", page_size)))?;
        let params = GetQueryResultsParameters {
            location: job.location.clone(),
            max_results: Some(max_results),
            page_token: page_token.map(|t| t.to_string()),
            timeout_ms: Some(QUERY_TIMEOUT_MS),
            ..Default::default()
        };

        let response = self.client
            .job()
            .get_query_results(&self.project_id, &job.job_id, params)
            .await
            .map_err(|e| {
                let ctx = ErrorContext::new("fetch_page");
                PublishError::QueryExecution(parse_bq_error(e, ctx))
            })?;

        let fields = response
            .schema
            .as_ref()
            .and_then(|s| s.fields.clone())
            .unwrap_or_default();
        let rows = decode_rows(&fields, response.rows.as_deref().unwrap_or_default());

        Ok(ResultPage {
            rows,
            next_page_token: response.page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn drop_table(&self, table: &TableId) -> Result<()> {
        self.client
            .table()
            .delete(&table.project, &table.dataset, &table.table)
            .await
            .map_err(|e| {
                let ctx = ErrorContext::new("drop_table").with_resource(table);
                PublishError::QueryExecution(parse_bq_error(e, ctx))
            })
    }

    async fn table_exists(&self, table: &TableId) -> Result<bool> {
        match self.client.table().get(&table.project, &table.dataset, &table.table, None).await {
            Ok(_) => Ok(true),
            Err(e) => {
                let ctx = ErrorContext::new("table_exists").with_resource(table);
                let err = parse_bq_error(e, ctx);
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(PublishError::QueryExecution(err))
                }
            }
        }
    }
}
