/// 消息编解码
///
/// 出站请求编码为 WebSocket 文本帧，入站文本 / 二进制帧解码为 `Frame`

use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::{Frame, WsRequest};
use crate::errors::{Error, Result};

/// 编码请求为 WebSocket 消息
pub fn encode(request: &WsRequest) -> Result<WsMessage> {
    let json = request.to_json()?;
    Ok(WsMessage::Text(json))
}

/// 解码 WebSocket 消息
///
/// 控制帧（Ping / Pong / Frame）返回 `Ok(None)`，关闭帧返回 `ConnectionClosed`
pub fn decode(ws_msg: WsMessage) -> Result<Option<Frame>> {
    match ws_msg {
        WsMessage::Text(text) => Frame::from_json(&text).map(Some),
        WsMessage::Binary(data) => {
            let text = String::from_utf8(data)
                .map_err(|e| Error::InvalidArgument(format!("二进制消息不是 UTF-8: {}", e)))?;
            Frame::from_json(&text).map(Some)
        }
        WsMessage::Close(_) => Err(Error::ConnectionClosed),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws_rpc::RequestKind;

    #[test]
    fn test_encode_text_frame() {
        let req = WsRequest::with_codes(RequestKind::ReqInfo, &["AAPL.US".to_string()]);
        match encode(&req).unwrap() {
            WsMessage::Text(text) => assert!(text.contains(r#""type":"RI""#)),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_variants() {
        let frame = decode(WsMessage::Text(r#"{"type":"H"}"#.to_string())).unwrap();
        assert_eq!(frame, Some(Frame::HeartbeatAck));

        let frame = decode(WsMessage::Binary(br#"{"tp":"D","data":[]}"#.to_vec())).unwrap();
        assert!(matches!(frame, Some(Frame::Push(_))));

        assert_eq!(decode(WsMessage::Ping(vec![1])).unwrap(), None);
        assert!(matches!(decode(WsMessage::Close(None)), Err(Error::ConnectionClosed)));
        assert!(decode(WsMessage::Binary(vec![0xff, 0xfe])).is_err());
    }
}
