//! gRPC ingress (spec §4.5/§6): the generated `Metrics` service wired onto
//! the same `Collector` the HTTP router uses.
//!
//! gRPC requests carry the subnet/signature checks as metadata rather than
//! as a buffered raw body, so the chain is split into a subnet guard (every
//! call) and an HMAC check recomputed over the re-encoded protobuf message
//! (unary calls only — `UpdateMetricsStream` skips signing, same as the
//! reference agent's gRPC transport never applies gzip/encryption to it).
//! Gzip and RSA envelope encryption are HTTP-only; tonic's own gzip codec
//! covers wire compression for this transport instead.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use prost::Message;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status, Streaming};
use vitals_collector::Collector;
use vitals_core::constants::{HASH_HEADER_NAME, REAL_IP_HEADER_NAME};
use vitals_core::error::Error;
use vitals_core::metric::{Metric as CoreMetric, MetricKind};
use vitals_wire::grpc::metrics_server::Metrics;
use vitals_wire::grpc::{
    GetAllMetricsRequest, GetAllMetricsResponse, GetMetricExtRequest, GetMetricExtResponse, GetMetricValueRequest,
    GetMetricValueResponse, Metric as WireMetric, StreamUpdateResponse, UpdateMetricExtRequest, UpdateMetricExtResponse,
    UpdateMetricRequest, UpdateMetricResponse, UpdateMetricsBatchRequest, UpdateMetricsBatchResponse, COUNTER, GAUGE,
};

use crate::state::AppState;

pub use vitals_wire::grpc::metrics_server::MetricsServer;

/// The `Metrics` service implementation shared between both servers' gRPC
/// listener.
pub struct GrpcService {
    state: AppState,
}

impl GrpcService {
    pub fn new(state: AppState) -> Self {
        GrpcService { state }
    }

    fn check_subnet(&self, metadata: &tonic::metadata::MetadataMap) -> Result<(), Status> {
        let Some(subnet) = self.state.trusted_subnet else {
            return Ok(());
        };
        let key = REAL_IP_HEADER_NAME.to_ascii_lowercase();
        let Some(value) = metadata.get(key.as_str()) else {
            return Ok(());
        };
        let allowed = value
            .to_str()
            .ok()
            .and_then(|s| s.parse::<IpAddr>().ok())
            .is_some_and(|ip: IpAddr| subnet.contains(&ip));
        if allowed {
            Ok(())
        } else {
            Err(Status::unavailable("untrusted subnet"))
        }
    }

    fn check_signature<T: Message>(&self, metadata: &tonic::metadata::MetadataMap, message: &T) -> Result<(), Status> {
        let Some(hmac_key) = &self.state.hmac_key else {
            return Ok(());
        };
        let header_name = HASH_HEADER_NAME.to_ascii_lowercase();
        let Some(signature) = metadata.get(header_name.as_str()).and_then(|v| v.to_str().ok()) else {
            return Ok(());
        };
        let encoded = message.encode_to_vec();
        vitals_crypto::hmac_sign::verify(hmac_key, &encoded, signature).map_err(|_| Status::aborted("HMAC signature mismatch"))
    }

    fn verify_unary<T: Message>(&self, request: &Request<T>) -> Result<(), Status> {
        self.check_subnet(request.metadata())?;
        self.check_signature(request.metadata(), request.get_ref())
    }
}

fn grpc_status(err: &Error) -> Status {
    match err {
        Error::MalformedInput(msg) => Status::invalid_argument(msg.clone()),
        Error::UnknownMetric { id } => Status::not_found(format!("unknown metric: {id}")),
        Error::IntegrityViolation(msg) => Status::aborted(msg.clone()),
        _ => Status::internal(err.to_string()),
    }
}

async fn apply(collector: &Collector, metric: &CoreMetric) -> vitals_core::error::Result<()> {
    match metric.kind {
        MetricKind::Gauge { value } => collector.set_gauge(&metric.id, value).await,
        MetricKind::Counter { delta } => collector.set_counter(&metric.id, delta).await,
    }
}

#[tonic::async_trait]
impl Metrics for GrpcService {
    async fn get_metric_value(&self, request: Request<GetMetricValueRequest>) -> Result<Response<GetMetricValueResponse>, Status> {
        self.verify_unary(&request)?;
        let req = request.into_inner();
        let result = match req.mtype.as_str() {
            GAUGE => self.state.collector.get_gauge(&req.id).await.map(|v| v.to_string()),
            COUNTER => self.state.collector.get_counter(&req.id).await.map(|v| v.to_string()),
            other => return Err(Status::invalid_argument(format!("unknown metric type: {other}"))),
        };
        result
            .map(|value| Response::new(GetMetricValueResponse { value }))
            .map_err(|err| grpc_status(&err))
    }

    async fn update_metric(&self, request: Request<UpdateMetricRequest>) -> Result<Response<UpdateMetricResponse>, Status> {
        self.verify_unary(&request)?;
        let req = request.into_inner();
        let metric = match req.mtype.as_str() {
            GAUGE => req
                .value
                .parse::<f64>()
                .ok()
                .and_then(|v| CoreMetric::gauge(&req.id, v).ok()),
            COUNTER => req
                .value
                .parse::<i64>()
                .ok()
                .and_then(|v| CoreMetric::counter(&req.id, v).ok()),
            other => return Err(Status::invalid_argument(format!("unknown metric type: {other}"))),
        };
        let Some(metric) = metric else {
            return Err(Status::invalid_argument("malformed metric value"));
        };
        apply(&self.state.collector, &metric)
            .await
            .map(|()| Response::new(UpdateMetricResponse {}))
            .map_err(|err| grpc_status(&err))
    }

    async fn get_metric_ext(&self, request: Request<GetMetricExtRequest>) -> Result<Response<GetMetricExtResponse>, Status> {
        self.verify_unary(&request)?;
        let req = request.into_inner();
        let metric = match req.mtype.as_str() {
            GAUGE => self
                .state
                .collector
                .get_gauge(&req.id)
                .await
                .and_then(|v| CoreMetric::gauge(&req.id, v)),
            COUNTER => self
                .state
                .collector
                .get_counter(&req.id)
                .await
                .and_then(|v| CoreMetric::counter(&req.id, v)),
            other => return Err(Status::invalid_argument(format!("unknown metric type: {other}"))),
        };
        metric
            .map(|metric| Response::new(GetMetricExtResponse { metric: Some((&metric).into()) }))
            .map_err(|err| grpc_status(&err))
    }

    async fn update_metric_ext(&self, request: Request<UpdateMetricExtRequest>) -> Result<Response<UpdateMetricExtResponse>, Status> {
        self.verify_unary(&request)?;
        let req = request.into_inner();
        let Some(wire_metric) = req.metric else {
            return Err(Status::invalid_argument("missing metric"));
        };
        let metric: CoreMetric = wire_metric.try_into().map_err(|err: Error| grpc_status(&err))?;
        apply(&self.state.collector, &metric).await.map_err(|err| grpc_status(&err))?;
        Ok(Response::new(UpdateMetricExtResponse { metric: Some((&metric).into()) }))
    }

    async fn get_all_metrics(&self, request: Request<GetAllMetricsRequest>) -> Result<Response<GetAllMetricsResponse>, Status> {
        self.verify_unary(&request)?;
        let (gauges, counters) = self.state.collector.get_all().await.map_err(|err| grpc_status(&err))?;
        let metrics = gauges_and_counters_to_wire(gauges, counters);
        Ok(Response::new(GetAllMetricsResponse { metrics }))
    }

    async fn update_metrics_batch(
        &self,
        request: Request<UpdateMetricsBatchRequest>,
    ) -> Result<Response<UpdateMetricsBatchResponse>, Status> {
        self.verify_unary(&request)?;
        let req = request.into_inner();
        let metrics: Vec<CoreMetric> = req
            .metrics
            .into_iter()
            .map(CoreMetric::try_from)
            .collect::<Result<_, _>>()
            .map_err(|err: Error| grpc_status(&err))?;
        self.state
            .collector
            .set_batch(&metrics)
            .await
            .map(|()| Response::new(UpdateMetricsBatchResponse {}))
            .map_err(|err| grpc_status(&err))
    }

    type UpdateMetricsStreamStream = ReceiverStream<Result<StreamUpdateResponse, Status>>;

    async fn update_metrics_stream(
        &self,
        request: Request<Streaming<UpdateMetricExtRequest>>,
    ) -> Result<Response<Self::UpdateMetricsStreamStream>, Status> {
        self.check_subnet(request.metadata())?;
        let mut incoming = request.into_inner();
        let collector = Arc::clone(&self.state.collector);
        let (tx, rx) = tokio::sync::mpsc::channel(16);

        tokio::spawn(async move {
            while let Some(item) = incoming.next().await {
                let response = match item {
                    Ok(req) => handle_stream_item(&collector, req).await,
                    Err(err) => StreamUpdateResponse {
                        id: String::new(),
                        success: false,
                        error: err.to_string(),
                    },
                };
                if tx.send(Ok(response)).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

async fn handle_stream_item(collector: &Collector, req: UpdateMetricExtRequest) -> StreamUpdateResponse {
    let Some(wire_metric) = req.metric else {
        return StreamUpdateResponse {
            id: String::new(),
            success: false,
            error: "missing metric".into(),
        };
    };
    let id = wire_metric.id.clone();
    match CoreMetric::try_from(wire_metric) {
        Ok(metric) => match apply(collector, &metric).await {
            Ok(()) => StreamUpdateResponse { id, success: true, error: String::new() },
            Err(err) => StreamUpdateResponse { id, success: false, error: err.to_string() },
        },
        Err(err) => StreamUpdateResponse { id, success: false, error: err.to_string() },
    }
}

fn gauges_and_counters_to_wire(gauges: HashMap<String, f64>, counters: HashMap<String, i64>) -> Vec<WireMetric> {
    let mut metrics = Vec::with_capacity(gauges.len() + counters.len());
    for (id, value) in gauges {
        metrics.push(WireMetric {
            id,
            mtype: GAUGE.to_string(),
            value: Some(value),
            delta: None,
        });
    }
    for (id, delta) in counters {
        metrics.push(WireMetric {
            id,
            mtype: COUNTER.to_string(),
            value: None,
            delta: Some(delta),
        });
    }
    metrics
}
